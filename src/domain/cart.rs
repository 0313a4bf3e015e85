//! Cart lines and subtotal computation.
//!
//! The subtotal shown on the cart uses the price captured when the item was
//! added; checkout re-prices against the live catalog.

use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

pub fn subtotal(lines: &[CartLine]) -> i64 {
    lines.iter().map(CartLine::line_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: i32) -> CartLine {
        CartLine { product_id: Uuid::now_v7(), name: "Widget".into(), quantity: qty, unit_price: price }
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let lines = vec![line(500, 2), line(300, 1)];
        assert_eq!(lines[0].line_total(), 1000);
        assert_eq!(subtotal(&lines), 1300);
    }

    #[test]
    fn empty_cart_subtotal_is_zero() {
        assert_eq!(subtotal(&[]), 0);
    }
}
