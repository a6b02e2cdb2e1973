use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt;
use crate::db::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub access_token: String,
}

/// POST /api/auth/register
/// Create a new account with an argon2-hashed password and return an
/// access token for it.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    if req.full_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Full name cannot be empty".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "Invalid email".to_string()));
    }
    if req.password.len() < 6 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let db = state.db.clone();
    let email = req.email.to_lowercase();
    let full_name = req.full_name.trim().to_string();
    let password = req.password.clone();

    // Hashing is CPU-bound, so it runs on the blocking pool together with
    // the insert.
    let (user_id, email, full_name) = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Hash password: {}", e)))?
            .to_string();

        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let taken: Option<String> = conn
            .query_row("SELECT id FROM users WHERE email = ?1", [&email], |row| {
                row.get(0)
            })
            .ok();
        if taken.is_some() {
            return Err((StatusCode::CONFLICT, "Email already registered".to_string()));
        }

        let user_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, is_active, is_admin, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 1, 0, ?5, ?6)",
            rusqlite::params![user_id, email, password_hash, full_name, now, now],
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert user: {}", e)))?;

        Ok::<_, (StatusCode, String)>((user_id, email, full_name))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    let access_token = jwt::issue_access_token(&state.jwt_secret, &user_id, &email, false)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Issue token: {}", e)))?;

    tracing::info!(user_id = %user_id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            email,
            full_name,
            is_admin: false,
            access_token,
        }),
    ))
}

/// POST /api/auth/login
/// Verify credentials and return an access token. Inactive accounts are
/// rejected with 403 even when the password matches.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let email = req.email.to_lowercase();
    let password = req.password.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

        let user: User = conn
            .query_row(
                "SELECT id, email, password_hash, full_name, is_active, is_admin, created_at, updated_at FROM users WHERE email = ?1",
                [&email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        full_name: row.get(3)?,
                        is_active: row.get(4)?,
                        is_admin: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

        let parsed = PasswordHash::new(&user.password_hash).map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Stored hash invalid: {}", e),
            )
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

        Ok::<_, (StatusCode, String)>(user)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    if !user.is_active {
        return Err((
            StatusCode::FORBIDDEN,
            "User is inactive, talk with an admin".to_string(),
        ));
    }

    let access_token =
        jwt::issue_access_token(&state.jwt_secret, &user.id, &user.email, user.is_admin)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Issue token: {}", e)))?;

    tracing::info!(user_id = %user.id, "Login");

    Ok(Json(AuthResponse {
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        is_admin: user.is_admin,
        access_token,
    }))
}
