//! Checkout and order lifecycle.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{validated, PaginatedResponse, Pagination};
use crate::auth::AuthUser;
use crate::domain::events::AppEvent;
use crate::domain::order::{compute_totals, OrderStatus, PaymentStatus, PricedLine};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
    pub ship_name: String,
    pub ship_street: String,
    pub ship_city: String,
    pub ship_zip: String,
    pub ship_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub zip: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(range(min = 0))]
    pub shipping: i64,
    #[validate(range(min = 0))]
    pub tax: i64,
    #[validate]
    pub address: AddressRequest,
}

#[derive(sqlx::FromRow)]
struct CheckoutLineRow {
    product_id: Uuid,
    quantity: i32,
    name: String,
    price: i64,
    stock: i32,
    status: String,
}

/// Re-prices the cart against the live catalog, snapshots it into an order
/// and empties the cart inside one transaction, so a failure anywhere
/// leaves both cart and stock untouched.
pub async fn checkout(
    State(s): State<AppState>,
    user: AuthUser,
    Json(r): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    validated(&r)?;

    let mut tx = s.db.begin().await?;
    let lines = sqlx::query_as::<_, CheckoutLineRow>(
        "SELECT ci.product_id, ci.quantity, p.name, p.price, p.stock, p.status \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 ORDER BY ci.created_at FOR UPDATE",
    )
    .bind(user.id)
    .fetch_all(&mut *tx)
    .await?;
    if lines.is_empty() {
        return Err(ApiError::bad_request("cart is empty"));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.status != "active" {
            return Err(ApiError::bad_request(format!("{} is no longer available", line.name)));
        }
        if line.stock < line.quantity {
            return Err(ApiError::bad_request(format!("insufficient stock for {}", line.name)));
        }
        priced.push(PricedLine {
            product_id: line.product_id,
            name: line.name.clone(),
            unit_price: line.price,
            quantity: line.quantity,
        });
    }

    let totals = compute_totals(&priced, r.shipping, r.tax);
    let order_number = format!("ORD-{:08}", rand::random::<u32>());
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, order_number, user_id, status, payment_status, subtotal, shipping, tax, total, \
                             ship_name, ship_street, ship_city, ship_zip, ship_phone, created_at, updated_at) \
         VALUES ($1, $2, $3, 'pending', 'unpaid', $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&order_number)
    .bind(user.id)
    .bind(totals.subtotal)
    .bind(totals.shipping)
    .bind(totals.tax)
    .bind(totals.total)
    .bind(r.address.name.trim())
    .bind(r.address.street.trim())
    .bind(r.address.city.trim())
    .bind(r.address.zip.trim())
    .bind(&r.address.phone)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for line in &priced {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, product_id, name, unit_price, quantity, line_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.line_total())
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        items.push(item);
    }
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    s.notifier.send_email(
        &user.email,
        &format!("Order {} received", order.order_number),
        format!(
            "Hi {},\n\nWe received your order {} for a total of {}.\nWe will let you know once payment is confirmed.\n",
            user.name, order.order_number, order.total
        ),
    );
    s.notifier.publish(AppEvent::OrderCreated { order_id: order.id, user_id: user.id, total: order.total });

    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })))
}

pub async fn list_orders(
    State(s): State<AppState>,
    user: AuthUser,
    Query(p): Query<Pagination>,
) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let (page, limit, offset) = p.clamp();
    let (orders, total) = if user.is_admin() {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&s.db)
            .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&s.db).await?;
        (orders, total.0)
    } else {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $3 ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .bind(user.id)
        .fetch_all(&s.db)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&s.db)
            .await?;
        (orders, total.0)
    };
    Ok(Json(PaginatedResponse { data: orders, total, page }))
}

async fn fetch_visible_order(s: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Order> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    if order.user_id != user.id && !user.is_admin() {
        return Err(ApiError::NotFound("order"));
    }
    Ok(order)
}

pub async fn get_order(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderResponse>> {
    let order = fetch_visible_order(&s, &user, id).await?;
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
        .bind(id)
        .fetch_all(&s.db)
        .await?;
    Ok(Json(OrderResponse { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

pub async fn update_order(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateOrderRequest>,
) -> ApiResult<Json<Order>> {
    admin.require_admin()?;
    if r.status.is_none() && r.payment_status.is_none() {
        return Err(ApiError::bad_request("nothing to update"));
    }

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    let current_status = OrderStatus::parse(&order.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status on order {id}"))?;
    let current_payment = PaymentStatus::parse(&order.payment_status)
        .ok_or_else(|| anyhow::anyhow!("corrupt payment status on order {id}"))?;

    let next_status = match r.status.as_deref() {
        Some(v) => OrderStatus::parse(v)
            .ok_or_else(|| ApiError::bad_request(format!("unknown order status: {v}")))?,
        None => current_status,
    };
    let next_payment = match r.payment_status.as_deref() {
        Some(v) => PaymentStatus::parse(v)
            .ok_or_else(|| ApiError::bad_request(format!("unknown payment status: {v}")))?,
        None => current_payment,
    };
    if !current_status.can_transition_to(next_status) {
        return Err(ApiError::bad_request(format!(
            "cannot move a {} order to {}",
            current_status.as_str(),
            next_status.as_str()
        )));
    }
    if !current_payment.can_transition_to(next_payment) {
        return Err(ApiError::bad_request(format!(
            "cannot move payment from {} to {}",
            current_payment.as_str(),
            next_payment.as_str()
        )));
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next_status.as_str())
    .bind(next_payment.as_str())
    .fetch_one(&s.db)
    .await?;

    notify_order_change(&s, &updated).await;
    Ok(Json(updated))
}

pub async fn cancel_order(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = fetch_visible_order(&s, &user, id).await?;
    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status on order {id}"))?;
    let payment = PaymentStatus::parse(&order.payment_status)
        .ok_or_else(|| anyhow::anyhow!("corrupt payment status on order {id}"))?;

    if status == OrderStatus::Completed {
        return Err(ApiError::bad_request("a completed order cannot be cancelled"));
    }
    if status == OrderStatus::Cancelled {
        return Err(ApiError::bad_request("order is already cancelled"));
    }

    let updated = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'cancelled', payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payment.after_cancel().as_str())
    .fetch_one(&s.db)
    .await?;

    notify_order_change(&s, &updated).await;
    Ok(Json(updated))
}

async fn notify_order_change(s: &AppState, order: &Order) {
    if let Ok(Some((email, name))) =
        sqlx::query_as::<_, (String, String)>("SELECT email, name FROM users WHERE id = $1")
            .bind(order.user_id)
            .fetch_optional(&s.db)
            .await
    {
        s.notifier.send_email(
            &email,
            &format!("Order {} update", order.order_number),
            format!(
                "Hi {name},\n\nOrder {} is now {} (payment: {}).\n",
                order.order_number, order.status, order.payment_status
            ),
        );
    }
    s.notifier.publish(AppEvent::OrderStatusChanged {
        order_id: order.id,
        status: order.status.clone(),
        payment_status: order.payment_status.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressRequest {
        AddressRequest {
            name: "Asha".into(),
            street: "12 Lake Rd".into(),
            city: "Pune".into(),
            zip: "411001".into(),
            phone: None,
        }
    }

    #[test]
    fn checkout_rejects_negative_shipping_or_tax() {
        let r = CheckoutRequest { shipping: -1, tax: 0, address: address() };
        assert!(r.validate().is_err());
        let r = CheckoutRequest { shipping: 0, tax: -50, address: address() };
        assert!(r.validate().is_err());
    }

    #[test]
    fn checkout_rejects_blank_address_fields() {
        let mut bad = address();
        bad.city = "".into();
        let r = CheckoutRequest { shipping: 100, tax: 50, address: bad };
        assert!(r.validate().is_err());
    }

    #[test]
    fn checkout_accepts_valid_request() {
        let r = CheckoutRequest { shipping: 100, tax: 50, address: address() };
        assert!(r.validate().is_ok());
    }
}
