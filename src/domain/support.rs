//! Support record lifecycles: tickets and inquiries.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketStatus {
    New,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Tickets only move forward: new -> in_progress -> resolved.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::InProgress) | (Self::InProgress, Self::Resolved)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InquiryStatus {
    New,
    Answered,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Answered => "answered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "answered" => Some(Self::Answered),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_advance_one_step_at_a_time() {
        assert!(TicketStatus::New.can_transition_to(TicketStatus::InProgress));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Resolved));
    }

    #[test]
    fn tickets_never_skip_or_reopen() {
        assert!(!TicketStatus::New.can_transition_to(TicketStatus::Resolved));
        assert!(!TicketStatus::Resolved.can_transition_to(TicketStatus::New));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::New));
    }
}
