//! Signup, email verification, login and sessions.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::users::{UserResponse, USER_COLUMNS};
use super::validated;
use crate::auth::{self, AuthUser};
use crate::domain::user::Role;
use crate::error::{on_conflict, ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 20))]
    pub mobile: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Option<String>,
    pub license_number: Option<String>,
    pub company_address: Option<String>,
}

pub async fn signup(
    State(s): State<AppState>,
    Json(r): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    validated(&r)?;
    let role = match r.role.as_deref() {
        None | Some("USER") => Role::User,
        Some("ADMIN") => return Err(ApiError::bad_request("cannot self-register as admin")),
        Some(other) => {
            Role::parse(other).ok_or_else(|| ApiError::bad_request(format!("unknown role: {other}")))?
        }
    };
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if role == Role::Doctor && blank(&r.license_number) {
        return Err(ApiError::bad_request("license_number is required for doctor accounts"));
    }
    if role == Role::Supplier && blank(&r.company_address) {
        return Err(ApiError::bad_request("company_address is required for supplier accounts"));
    }

    let password_hash = auth::hash_password(&r.password)?;
    let verify_token = Uuid::new_v4().to_string();
    let user = sqlx::query_as::<_, UserResponse>(&format!(
        "INSERT INTO users (id, email, mobile, password_hash, name, role, is_verified, is_approved, \
                            verify_token, license_number, company_address, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8, $9, $10, NOW()) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(r.email.trim())
    .bind(r.mobile.trim())
    .bind(&password_hash)
    .bind(r.name.trim())
    .bind(role.as_str())
    .bind(!role.requires_approval())
    .bind(&verify_token)
    .bind(&r.license_number)
    .bind(&r.company_address)
    .fetch_one(&s.db)
    .await
    .map_err(|e| on_conflict(e, "an account with this email or mobile already exists"))?;

    let link = format!("{}/api/auth/verify?token={verify_token}", s.config.public_base_url);
    s.notifier.send_email(
        &user.email,
        "Verify your account",
        format!("Hi {},\n\nConfirm your address by visiting {link}\n", user.name),
    );

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

pub async fn verify(
    State(s): State<AppState>,
    Query(p): Query<VerifyParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let updated = sqlx::query("UPDATE users SET is_verified = TRUE, verify_token = NULL WHERE verify_token = $1")
        .bind(&p.token)
        .execute(&s.db)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::bad_request("invalid or expired verification token"));
    }
    Ok(Json(serde_json::json!({ "message": "account verified" })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
    role: String,
    is_verified: bool,
    is_approved: bool,
}

pub async fn login(
    State(s): State<AppState>,
    Json(r): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validated(&r)?;
    let creds = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, password_hash, role, is_verified, is_approved FROM users WHERE email = $1",
    )
    .bind(r.email.trim())
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    if !auth::verify_password(&creds.password_hash, &r.password) {
        return Err(ApiError::Unauthorized);
    }
    if !creds.is_verified {
        return Err(ApiError::Forbidden("account not verified"));
    }
    let role = Role::parse(&creds.role).ok_or_else(|| anyhow::anyhow!("corrupt role on user {}", creds.id))?;
    if role.requires_approval() && !creds.is_approved {
        return Err(ApiError::Forbidden("account pending approval"));
    }

    let token = auth::create_session(&s.db, creds.id).await?;
    let user = sqlx::query_as::<_, UserResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(creds.id)
        .fetch_one(&s.db)
        .await?;
    Ok(Json(LoginResponse { token, user }))
}

pub async fn logout(
    State(s): State<AppState>,
    headers: HeaderMap,
    _user: AuthUser,
) -> ApiResult<StatusCode> {
    let token = auth::bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<UserResponse>> {
    let row = sqlx::query_as::<_, UserResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user.id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_bad_email_and_short_password() {
        let r = SignupRequest {
            name: "Asha".into(),
            email: "not-an-email".into(),
            mobile: "0712345678".into(),
            password: "longenough".into(),
            role: None,
            license_number: None,
            company_address: None,
        };
        assert!(r.validate().is_err());

        let r = SignupRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            mobile: "0712345678".into(),
            password: "short".into(),
            role: None,
            license_number: None,
            company_address: None,
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn signup_accepts_well_formed_input() {
        let r = SignupRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            mobile: "0712345678".into(),
            password: "longenough".into(),
            role: Some("DOCTOR".into()),
            license_number: Some("MD-1234".into()),
            company_address: None,
        };
        assert!(r.validate().is_ok());
    }
}
