//! Domain events published to NATS when a broker is configured.

use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    OrderCreated { order_id: Uuid, user_id: Uuid, total: i64 },
    OrderStatusChanged { order_id: Uuid, status: String, payment_status: String },
    ReceiptReviewed { receipt_id: Uuid, status: String },
    TicketUpdated { ticket_id: Uuid, status: String },
    AppointmentUpdated { appointment_id: Uuid, status: String },
}

impl AppEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "wellness.order.created",
            Self::OrderStatusChanged { .. } => "wellness.order.status",
            Self::ReceiptReviewed { .. } => "wellness.receipt.reviewed",
            Self::TicketUpdated { .. } => "wellness.ticket.updated",
            Self::AppointmentUpdated { .. } => "wellness.appointment.updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let e = AppEvent::OrderCreated { order_id: Uuid::nil(), user_id: Uuid::nil(), total: 1450 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order_created");
        assert_eq!(json["total"], 1450);
        assert_eq!(e.subject(), "wellness.order.created");
    }
}
