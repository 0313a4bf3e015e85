//! Account administration: listing and the doctor/supplier approval workflow.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::user::Role;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Public projection of an account row; never carries the password hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub mobile: String,
    pub name: String,
    pub role: String,
    pub is_verified: bool,
    pub is_approved: bool,
    pub license_number: Option<String>,
    pub company_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const USER_COLUMNS: &str =
    "id, email, mobile, name, role, is_verified, is_approved, license_number, company_address, created_at";

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    pub pending: Option<bool>,
}

pub async fn list_users(
    State(s): State<AppState>,
    user: AuthUser,
    Query(p): Query<UserListParams>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    user.require_admin()?;
    let role = match p.role.as_deref() {
        Some(r) => Some(
            Role::parse(r)
                .ok_or_else(|| ApiError::bad_request(format!("unknown role: {r}")))?
                .as_str(),
        ),
        None => None,
    };
    let users = sqlx::query_as::<_, UserResponse>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE ($1::TEXT IS NULL OR role = $1) \
           AND (NOT $2::BOOL OR (is_approved = FALSE AND role IN ('DOCTOR', 'SUPPLIER'))) \
         ORDER BY created_at DESC"
    ))
    .bind(role)
    .bind(p.pending.unwrap_or(false))
    .fetch_all(&s.db)
    .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

pub async fn set_approval(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ApprovalRequest>,
) -> ApiResult<Json<UserResponse>> {
    admin.require_admin()?;
    let target = sqlx::query_as::<_, UserResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let role = Role::parse(&target.role).ok_or_else(|| anyhow::anyhow!("corrupt role on user {id}"))?;
    if !role.requires_approval() {
        return Err(ApiError::bad_request("only doctor and supplier accounts go through approval"));
    }

    let updated = sqlx::query_as::<_, UserResponse>(&format!(
        "UPDATE users SET is_approved = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(r.approved)
    .fetch_one(&s.db)
    .await?;

    let (subject, body) = if r.approved {
        ("Account approved", format!("Hi {},\n\nYour account has been approved. You can now log in.\n", updated.name))
    } else {
        ("Account application declined", format!("Hi {},\n\nYour account application was declined.\n", updated.name))
    };
    s.notifier.send_email(&updated.email, subject, body);

    Ok(Json(updated))
}
