//! Strongly-typed identifiers.
//!
//! Correlation ids are string-backed newtypes so upstream ticket systems
//! can supply their own keys; generated ids are UUID-based.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation id tying a recovery run back to its incident ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_display() {
        let id = TicketId::new("INC-4211");
        assert_eq!(id.to_string(), "ticket:INC-4211");
        assert_eq!(id.as_str(), "INC-4211");
    }

    #[test]
    fn test_ticket_id_generation() {
        let a = TicketId::generate();
        let b = TicketId::generate();
        assert_ne!(a, b);
    }
}
