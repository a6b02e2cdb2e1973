//! Demo-data seeding.
//!
//! POST /api/seed wipes the catalog and user tables and repopulates them
//! with a known data set, so a fresh checkout (or a demo gone sideways)
//! can be reset with one call.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::products::crud::slugify;
use crate::state::AppState;

/// Seed users. Passwords are plain here and hashed at insert time; the
/// inactive account exists so login/WS rejection paths can be exercised
/// against seeded data.
const SEED_USERS: &[(&str, &str, &str, bool, bool)] = &[
    // (email, password, full_name, is_active, is_admin)
    ("admin@tienda.dev", "Admin123", "Ada Lovelace", true, true),
    ("staff@tienda.dev", "Staff123", "Alan Turing", true, false),
    ("dormant@tienda.dev", "Dormant123", "Grace Hopper", false, false),
];

/// Starter catalog: (title, description, price, stock).
const SEED_PRODUCTS: &[(&str, &str, f64, i64)] = &[
    ("Chill Crew Neck Sweatshirt", "Relaxed fit crew neck in heavyweight cotton.", 75.0, 7),
    ("Quilted Shirt Jacket", "Warm quilted overshirt for cold mornings.", 200.0, 5),
    ("Raven Lightweight Zip Up Bomber", "Packable bomber with a matte finish.", 130.0, 10),
    ("Turbine Long Sleeve Tee", "Moisture-wicking long sleeve tee.", 45.0, 50),
    ("Cybertruck Bulletproof Tee", "Graphic tee, pre-shrunk.", 30.0, 150),
    ("Kids Racing Stripe Tee", "Soft tee with a retro racing stripe.", 30.0, 100),
];

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub users: usize,
    pub products: usize,
}

/// POST /api/seed — Reset demo data: delete all products and users, then
/// insert the seed set. Unauthenticated by design; this backend is a demo
/// target and existing tokens keep working only if their user is reseeded.
pub async fn run_seed(
    State(state): State<AppState>,
) -> Result<Json<SeedResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        conn.execute("DELETE FROM products", [])
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Wipe products: {}", e)))?;
        conn.execute("DELETE FROM users", [])
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Wipe users: {}", e)))?;

        let now = Utc::now().to_rfc3339();

        for (email, password, full_name, is_active, is_admin) in SEED_USERS {
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Hash seed password: {}", e),
                    )
                })?
                .to_string();

            conn.execute(
                "INSERT INTO users (id, email, password_hash, full_name, is_active, is_admin, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    Uuid::now_v7().to_string(),
                    email,
                    password_hash,
                    full_name,
                    is_active,
                    is_admin,
                    now,
                    now
                ],
            )
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert seed user: {}", e)))?;
        }

        for (title, description, price, stock) in SEED_PRODUCTS {
            let slug = slugify(title);
            conn.execute(
                "INSERT INTO products (id, title, slug, description, price, stock, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    Uuid::now_v7().to_string(),
                    title,
                    slug,
                    description,
                    price,
                    stock,
                    now,
                    now
                ],
            )
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert seed product: {}", e)))?;
        }

        Ok::<_, (StatusCode, String)>(SeedResponse {
            users: SEED_USERS.len(),
            products: SEED_PRODUCTS.len(),
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    tracing::info!(
        users = response.users,
        products = response.products,
        "Database reseeded"
    );

    Ok(Json(response))
}
