use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::db::models::Product;
use crate::state::AppState;

// --- Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            slug: product.slug,
            description: product.description.unwrap_or_default(),
            price: product.price,
            stock: product.stock,
        }
    }
}

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
}

/// Derive a URL-safe slug from a title: lowercase, spaces to underscores,
/// apostrophes dropped.
pub(crate) fn slugify(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('\'', "")
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        stock: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// --- Handlers ---

/// GET /api/products — List the catalog, ordered by title. Public.
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, StatusCode> {
    let db = state.db.clone();

    let products = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut stmt = conn
            .prepare("SELECT id, title, slug, description, price, stock, created_at, updated_at FROM products ORDER BY title ASC")
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let products: Vec<ProductResponse> = stmt
            .query_map([], |row| row_to_product(row))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .filter_map(|r| r.ok())
            .map(ProductResponse::from)
            .collect();

        Ok::<_, StatusCode>(products)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(products))
}

/// GET /api/products/{term} — Look up one product by id or by slug. Public.
pub async fn get_product(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<ProductResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let term = term.to_lowercase();

    let product = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        conn.query_row(
            "SELECT id, title, slug, description, price, stock, created_at, updated_at FROM products WHERE id = ?1 OR slug = ?1",
            [&term],
            |row| row_to_product(row),
        )
        .map_err(|_| (StatusCode::NOT_FOUND, format!("Product '{}' not found", term)))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(product.into()))
}

/// POST /api/products — Create a product (auth required).
/// Slug defaults to a slugified title; collisions are a 409.
pub async fn create_product(
    State(state): State<AppState>,
    _claims: Claims,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Product title cannot be empty".to_string(),
        ));
    }
    if req.price < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Price cannot be negative".to_string(),
        ));
    }

    let db = state.db.clone();
    let title = req.title.trim().to_string();
    let slug = slugify(req.slug.as_deref().unwrap_or(&title));
    let description = req.description.clone();
    let price = req.price;
    let stock = req.stock.unwrap_or(0);

    let product = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let slug_taken: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM products WHERE slug = ?1",
                [&slug],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if slug_taken {
            return Err((
                StatusCode::CONFLICT,
                format!("Product slug '{}' already exists", slug),
            ));
        }

        let product_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO products (id, title, slug, description, price, stock, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![product_id, title, slug, description, price, stock, now, now],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert product: {}", e)))?;

        Ok::<_, (StatusCode, String)>(ProductResponse {
            id: product_id,
            title,
            slug,
            description: description.unwrap_or_default(),
            price,
            stock,
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id} — Partial update (auth required).
/// Omitted fields keep their current values.
pub async fn update_product(
    State(state): State<AppState>,
    _claims: Claims,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, (StatusCode, String)> {
    if let Some(price) = req.price {
        if price < 0.0 {
            return Err((
                StatusCode::BAD_REQUEST,
                "Price cannot be negative".to_string(),
            ));
        }
    }

    let db = state.db.clone();
    let pid = product_id.clone();
    let title = req.title.map(|t| t.trim().to_string());
    let slug = req.slug.as_deref().map(slugify);
    let description = req.description.clone();
    let price = req.price;
    let stock = req.stock;

    let product = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let now = Utc::now().to_rfc3339();
        let rows = conn
            .execute(
                "UPDATE products SET
                    title = COALESCE(?1, title),
                    slug = COALESCE(?2, slug),
                    description = COALESCE(?3, description),
                    price = COALESCE(?4, price),
                    stock = COALESCE(?5, stock),
                    updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![title, slug, description, price, stock, now, pid],
            )
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Update product: {}", e),
                )
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Product not found".to_string()));
        }

        // Read back
        conn.query_row(
            "SELECT id, title, slug, description, price, stock, created_at, updated_at FROM products WHERE id = ?1",
            [&pid],
            |row| row_to_product(row),
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Read product: {}", e)))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(Json(product.into()))
}

/// DELETE /api/products/{id} — Remove a product (auth required).
pub async fn delete_product(
    State(state): State<AppState>,
    _claims: Claims,
    Path(product_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let db = state.db.clone();
    let pid = product_id.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let rows = conn
            .execute("DELETE FROM products WHERE id = ?1", [&pid])
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Delete product: {}", e),
                )
            })?;

        if rows == 0 {
            return Err((StatusCode::NOT_FOUND, "Product not found".to_string()));
        }

        Ok::<_, (StatusCode, String)>(())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_lowercases_and_replaces_spaces() {
        assert_eq!(slugify("Kids Cyberquad Bomber Jacket"), "kids_cyberquad_bomber_jacket");
    }

    #[test]
    fn slugify_drops_apostrophes() {
        assert_eq!(slugify("Men's Chill Crew Neck"), "mens_chill_crew_neck");
    }
}
