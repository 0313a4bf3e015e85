//! Appointment lifecycle.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Pending => matches!(next, Self::Confirmed | Self::Cancelled),
            Self::Confirmed => matches!(next, Self::Completed | Self::Cancelled),
            Self::Completed | Self::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_flow() {
        assert!(AppointmentStatus::Pending.can_transition_to(AppointmentStatus::Confirmed));
        assert!(AppointmentStatus::Confirmed.can_transition_to(AppointmentStatus::Completed));
        assert!(AppointmentStatus::Pending.can_transition_to(AppointmentStatus::Cancelled));
    }

    #[test]
    fn no_completion_without_confirmation() {
        assert!(!AppointmentStatus::Pending.can_transition_to(AppointmentStatus::Completed));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!AppointmentStatus::Cancelled.can_transition_to(AppointmentStatus::Pending));
        assert!(!AppointmentStatus::Completed.can_transition_to(AppointmentStatus::Confirmed));
    }
}
