//! Product catalog.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{validated, PaginatedResponse};
use crate::auth::AuthUser;
use crate::domain::user::Role;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::uploads;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub category: Option<String>,
    pub image_path: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ProductListParams>,
) -> ApiResult<Json<PaginatedResponse<Product>>> {
    let pagination = super::Pagination { page: p.page, per_page: p.per_page };
    let (page, limit, offset) = pagination.clamp();
    let filter = "status = 'active' \
                  AND ($1::TEXT IS NULL OR category = $1) \
                  AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')";
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT * FROM products WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(&p.category)
    .bind(&p.search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {filter}"))
        .bind(&p.category)
        .bind(&p.search)
        .fetch_one(&s.db)
        .await?;
    Ok(Json(PaginatedResponse { data: products, total: total.0, page }))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status <> 'archived'")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub category: Option<String>,
}

fn require_catalog_role(user: &AuthUser) -> Result<(), ApiError> {
    match user.role {
        Role::Admin | Role::Supplier => Ok(()),
        _ => Err(ApiError::Forbidden("supplier or admin access required")),
    }
}

/// Admins may touch any product; suppliers only their own.
fn require_ownership(user: &AuthUser, product: &Product) -> Result<(), ApiError> {
    if user.is_admin() || product.created_by == Some(user.id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("not your product"))
    }
}

pub async fn create_product(
    State(s): State<AppState>,
    user: AuthUser,
    Json(r): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_catalog_role(&user)?;
    validated(&r)?;
    let sku = format!("SKU-{:08}", rand::random::<u32>());
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, sku, name, description, price, stock, category, status, created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&sku)
    .bind(r.name.trim())
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock.unwrap_or(0))
    .bind(&r.category)
    .bind(user.id)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub category: Option<String>,
}

pub async fn update_product(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    require_catalog_role(&user)?;
    validated(&r)?;
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status <> 'archived'")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    require_ownership(&user, &existing)?;

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = COALESCE($2, name), description = COALESCE($3, description), \
         price = COALESCE($4, price), stock = COALESCE($5, stock), category = COALESCE($6, category), \
         updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&r.name)
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock)
    .bind(&r.category)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_catalog_role(&user)?;
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status <> 'archived'")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    require_ownership(&user, &existing)?;

    // Soft delete keeps the row for order-item history.
    sqlx::query("UPDATE products SET status = 'archived', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<Product>> {
    require_catalog_role(&user)?;
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status <> 'archived'")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    require_ownership(&user, &existing)?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request("file part is missing a content type"))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
            file = Some((content_type, bytes));
        }
    }
    let (content_type, bytes) = file.ok_or_else(|| ApiError::bad_request("missing file part"))?;

    let path = uploads::store(&s.config.upload_dir, &uploads::PRODUCT_IMAGES, &content_type, &bytes).await?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET image_path = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&path)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(product))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_negative_price() {
        let r = CreateProductRequest {
            name: "Ashwagandha".into(),
            description: None,
            price: -1,
            stock: None,
            category: None,
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn update_request_allows_sparse_fields() {
        let r = UpdateProductRequest { name: None, description: None, price: Some(0), stock: None, category: None };
        assert!(r.validate().is_ok());
    }
}
