//! Account roles

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Doctor,
    Supplier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Doctor => "DOCTOR",
            Self::Supplier => "SUPPLIER",
            Self::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Self::User),
            "DOCTOR" => Some(Self::Doctor),
            "SUPPLIER" => Some(Self::Supplier),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Doctors and suppliers stay locked out until an admin approves them.
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::Doctor | Self::Supplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for role in [Role::User, Role::Doctor, Role::Supplier, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("user"), None);
        assert_eq!(Role::parse("ROOT"), None);
    }

    #[test]
    fn approval_gate() {
        assert!(Role::Doctor.requires_approval());
        assert!(Role::Supplier.requires_approval());
        assert!(!Role::User.requires_approval());
        assert!(!Role::Admin.requires_approval());
    }
}
