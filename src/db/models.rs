/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Product record in the products table
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub created_at: String,
    pub updated_at: String,
}
