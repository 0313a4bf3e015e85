//! REST surface. One module per resource; `api_router` stitches them together.

pub mod appointments;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod receipts;
pub mod support;
pub mod users;

use axum::routing::{get, patch, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(users::list_users))
        .route("/api/users/:id/approval", patch(users::set_approval))
        .route("/api/products", get(products::list_products).post(products::create_product))
        .route(
            "/api/products/:id",
            get(products::get_product).patch(products::update_product).delete(products::delete_product),
        )
        .route("/api/products/:id/image", post(products::upload_image))
        .route("/api/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route("/api/cart/items/:product_id", patch(cart::update_item).delete(cart::remove_item))
        .route("/api/orders/checkout", post(orders::checkout))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/:id", get(orders::get_order).patch(orders::update_order))
        .route("/api/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/receipts", post(receipts::create_receipt).get(receipts::list_receipts))
        .route("/api/receipts/:id/review", patch(receipts::review_receipt))
        .route(
            "/api/appointments",
            post(appointments::create_appointment).get(appointments::list_appointments),
        )
        .route("/api/appointments/:id", patch(appointments::update_appointment))
        .route("/api/tickets", post(support::create_ticket).get(support::list_tickets))
        .route("/api/tickets/:id", patch(support::update_ticket).delete(support::delete_ticket))
        .route("/api/support/inquiries", post(support::create_inquiry).get(support::list_inquiries))
        .route("/api/support/inquiries/:id", patch(support::answer_inquiry))
        .route("/api/feedback", post(support::create_feedback).get(support::list_feedback))
        .route("/api/feedback/:id", patch(support::moderate_feedback).delete(support::delete_feedback))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    /// Returns (page, limit, offset) with per_page capped at 100.
    pub fn clamp(&self) -> (u32, i64, i64) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (page, per_page as i64, ((page - 1) * per_page) as i64)
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

pub(crate) fn validated<T: Validate>(value: &T) -> Result<(), ApiError> {
    value.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_bounds() {
        let p = Pagination { page: None, per_page: None };
        assert_eq!(p.clamp(), (1, 20, 0));

        let p = Pagination { page: Some(3), per_page: Some(500) };
        assert_eq!(p.clamp(), (3, 100, 200));

        let p = Pagination { page: Some(0), per_page: Some(0) };
        assert_eq!(p.clamp(), (1, 1, 0));
    }
}
