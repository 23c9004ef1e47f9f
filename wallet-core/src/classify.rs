// Backend error rewriting for transfers
// Structured codes are preferred; raw text is pattern-matched only when the
// backend sent no code

/// Which transfer flow produced the error; wording differs slightly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Withdrawal,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorCode {
    AuthConfig,
    InsufficientFunds,
    Network,
}

impl BackendErrorCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "AUTH_CONFIG" => Some(Self::AuthConfig),
            "INSUFFICIENT_FUNDS" => Some(Self::InsufficientFunds),
            "NETWORK" => Some(Self::Network),
            _ => None,
        }
    }

    /// Legacy fallback for backends that only send free text
    pub fn from_message(message: &str) -> Option<Self> {
        if message.contains("JWT") || message.contains("secretOrPrivateKey") {
            Some(Self::AuthConfig)
        } else if message.contains("insufficient") || message.contains("balance") {
            Some(Self::InsufficientFunds)
        } else if message.contains("network") || message.contains("connection") {
            Some(Self::Network)
        } else {
            None
        }
    }
}

/// User-facing text for a classified error, or `None` to pass the raw
/// message through
pub fn user_message(code: BackendErrorCode, kind: TransferKind) -> Option<&'static str> {
    match (code, kind) {
        (BackendErrorCode::AuthConfig, _) => {
            Some("Backend authentication configuration error. Please contact support.")
        }
        (BackendErrorCode::InsufficientFunds, TransferKind::Withdrawal) => {
            Some("Insufficient balance for this transaction.")
        }
        (BackendErrorCode::InsufficientFunds, TransferKind::Payment) => {
            Some("Insufficient balance for this payment.")
        }
        (BackendErrorCode::Network, TransferKind::Withdrawal) => {
            Some("Network error. Please try again later.")
        }
        (BackendErrorCode::Network, TransferKind::Payment) => None,
    }
}

/// Rewrite a failed transfer's error for display
pub fn rewrite_transfer_error(message: &str, code: Option<&str>, kind: TransferKind) -> String {
    let classified = code
        .and_then(BackendErrorCode::parse)
        .or_else(|| BackendErrorCode::from_message(message));

    classified
        .and_then(|c| user_message(c, kind))
        .map(str::to_string)
        .unwrap_or_else(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_rules_for_withdrawal() {
        let w = TransferKind::Withdrawal;
        assert_eq!(
            rewrite_transfer_error("secretOrPrivateKey must have a value", None, w),
            "Backend authentication configuration error. Please contact support."
        );
        assert_eq!(
            rewrite_transfer_error("JWT malformed", None, w),
            "Backend authentication configuration error. Please contact support."
        );
        assert_eq!(
            rewrite_transfer_error("op_underfunded: insufficient", None, w),
            "Insufficient balance for this transaction."
        );
        assert_eq!(
            rewrite_transfer_error("network timeout", None, w),
            "Network error. Please try again later."
        );
        assert_eq!(rewrite_transfer_error("Destination missing", None, w), "Destination missing");
    }

    #[test]
    fn test_payment_wording_and_network_passthrough() {
        let p = TransferKind::Payment;
        assert_eq!(
            rewrite_transfer_error("low balance", None, p),
            "Insufficient balance for this payment."
        );
        assert_eq!(rewrite_transfer_error("connection reset", None, p), "connection reset");
    }

    #[test]
    fn test_structured_code_wins_over_text() {
        assert_eq!(
            rewrite_transfer_error("something odd", Some("INSUFFICIENT_FUNDS"), TransferKind::Withdrawal),
            "Insufficient balance for this transaction."
        );
        // unknown code falls back to text matching
        assert_eq!(
            rewrite_transfer_error("JWT expired", Some("E999"), TransferKind::Payment),
            "Backend authentication configuration error. Please contact support."
        );
    }

    #[test]
    fn test_auth_rule_precedes_balance_rule() {
        assert_eq!(
            BackendErrorCode::from_message("JWT balance"),
            Some(BackendErrorCode::AuthConfig)
        );
    }
}
