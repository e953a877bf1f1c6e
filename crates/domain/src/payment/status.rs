//! Escrow status state machine.

use serde::{Deserialize, Serialize};

/// The escrow lifecycle state of a payment.
///
/// State transitions:
/// ```text
/// Pending ──► Held ──┬──► Released
///    │               ├──► Refunded
///    └──────────────►└──► Failed
/// ```
///
/// `Released`, `Refunded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    /// Payment created, funds not yet authorized.
    #[default]
    Pending,

    /// Funds authorized at the gateway and held in escrow.
    Held,

    /// Funds captured and released to the runner (terminal state).
    Released,

    /// Authorization voided and funds returned to the owner (terminal state).
    Refunded,

    /// The payment failed before reaching a settled outcome (terminal state).
    Failed,
}

impl EscrowStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Released | EscrowStatus::Refunded | EscrowStatus::Failed
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
            EscrowStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown escrow status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl std::str::FromStr for EscrowStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EscrowStatus::Pending),
            "held" => Ok(EscrowStatus::Held),
            "released" => Ok(EscrowStatus::Released),
            "refunded" => Ok(EscrowStatus::Refunded),
            "failed" => Ok(EscrowStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!EscrowStatus::Pending.is_terminal());
        assert!(!EscrowStatus::Held.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
        assert!(EscrowStatus::Failed.is_terminal());
    }

    #[test]
    fn test_display_matches_storage_form() {
        assert_eq!(EscrowStatus::Pending.to_string(), "pending");
        assert_eq!(EscrowStatus::Held.to_string(), "held");
        assert_eq!(EscrowStatus::Released.to_string(), "released");
        assert_eq!(EscrowStatus::Refunded.to_string(), "refunded");
        assert_eq!(EscrowStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [
            EscrowStatus::Pending,
            EscrowStatus::Held,
            EscrowStatus::Released,
            EscrowStatus::Refunded,
            EscrowStatus::Failed,
        ] {
            let parsed: EscrowStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_parse_unknown_fails() {
        let result = "settled".parse::<EscrowStatus>();
        assert_eq!(result, Err(UnknownStatus("settled".to_string())));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&EscrowStatus::Held).unwrap();
        assert_eq!(json, "\"held\"");
        let back: EscrowStatus = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(back, EscrowStatus::Refunded);
    }
}
