//! Per-user shopping cart.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::auth::AuthUser;
use crate::domain::cart::{self, CartLine};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub subtotal: i64,
}

async fn load_cart(db: &sqlx::PgPool, user_id: Uuid) -> ApiResult<CartResponse> {
    let items = sqlx::query_as::<_, CartLine>(
        "SELECT ci.product_id, p.name, ci.quantity, ci.price_at_add AS unit_price \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 ORDER BY ci.created_at",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    let subtotal = cart::subtotal(&items);
    Ok(CartResponse { items, subtotal })
}

pub async fn get_cart(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<CartResponse>> {
    Ok(Json(load_cart(&s.db, user.id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

pub async fn add_item(
    State(s): State<AppState>,
    user: AuthUser,
    Json(r): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<CartResponse>)> {
    validated(&r)?;
    let price: Option<(i64,)> = sqlx::query_as("SELECT price FROM products WHERE id = $1 AND status = 'active'")
        .bind(r.product_id)
        .fetch_optional(&s.db)
        .await?;
    let (price,) = price.ok_or(ApiError::NotFound("product"))?;

    sqlx::query(
        "INSERT INTO cart_items (id, user_id, product_id, quantity, price_at_add, created_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(r.product_id)
    .bind(r.quantity)
    .bind(price)
    .execute(&s.db)
    .await?;

    Ok((StatusCode::CREATED, Json(load_cart(&s.db, user.id).await?)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

pub async fn update_item(
    State(s): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(r): Json<SetQuantityRequest>,
) -> ApiResult<Json<CartResponse>> {
    validated(&r)?;
    let result = if r.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.id)
            .bind(product_id)
            .execute(&s.db)
            .await?
    } else {
        sqlx::query("UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2")
            .bind(user.id)
            .bind(product_id)
            .bind(r.quantity)
            .execute(&s.db)
            .await?
    };
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(Json(load_cart(&s.db, user.id).await?))
}

pub async fn remove_item(
    State(s): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<CartResponse>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.id)
        .bind(product_id)
        .execute(&s.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(Json(load_cart(&s.db, user.id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.id)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_item_requires_positive_quantity() {
        let r = AddItemRequest { product_id: Uuid::nil(), quantity: 0 };
        assert!(r.validate().is_err());
        let r = AddItemRequest { product_id: Uuid::nil(), quantity: 1 };
        assert!(r.validate().is_ok());
    }

    #[test]
    fn set_quantity_allows_zero_for_removal() {
        let r = SetQuantityRequest { quantity: 0 };
        assert!(r.validate().is_ok());
    }
}
