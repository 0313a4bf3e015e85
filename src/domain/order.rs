//! Order status machine and totals computation.

use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Same-state updates are idempotent; terminal states accept nothing else.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Pending => matches!(next, Self::Processing | Self::Completed | Self::Cancelled),
            Self::Processing => matches!(next, Self::Completed | Self::Cancelled),
            Self::Completed | Self::Cancelled => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Unpaid => next == Self::Paid,
            Self::Paid => next == Self::Refunded,
            Self::Refunded => false,
        }
    }

    /// Cancelling a paid order relabels the payment; no gateway call exists.
    pub fn after_cancel(&self) -> Self {
        match self {
            Self::Paid => Self::Refunded,
            other => *other,
        }
    }
}

/// A cart line re-priced against the live catalog at checkout time.
#[derive(Clone, Debug)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
}

pub fn compute_totals(lines: &[PricedLine], shipping: i64, tax: i64) -> OrderTotals {
    let subtotal: i64 = lines.iter().map(PricedLine::line_total).sum();
    OrderTotals { subtotal, shipping, tax, total: subtotal + shipping + tax }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: i32) -> PricedLine {
        PricedLine { product_id: Uuid::now_v7(), name: "Herb".into(), unit_price: price, quantity: qty }
    }

    #[test]
    fn totals_match_worked_example() {
        // cart = [{500 x 2}, {300 x 1}], shipping 100, tax 50
        let totals = compute_totals(&[line(500, 2), line(300, 1)], 100, 50);
        assert_eq!(
            totals,
            OrderTotals { subtotal: 1300, shipping: 100, tax: 50, total: 1450 }
        );
    }

    #[test]
    fn status_allows_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn terminal_states_reject_everything_else() {
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Processing));
        // idempotent same-state update stays legal
        assert!(OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn payment_transitions() {
        assert!(PaymentStatus::Unpaid.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Unpaid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
    }

    #[test]
    fn cancel_relabels_paid_as_refunded() {
        assert_eq!(PaymentStatus::Paid.after_cancel(), PaymentStatus::Refunded);
        assert_eq!(PaymentStatus::Unpaid.after_cancel(), PaymentStatus::Unpaid);
    }

    #[test]
    fn unknown_status_strings_do_not_parse() {
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(PaymentStatus::parse("PAID"), None);
    }
}
