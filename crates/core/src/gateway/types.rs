//! Transaction gateway data types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request-scoped identifiers fetched once per transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionContext {
    pub color_id: String,
    pub usage_id: String,
    pub partner_id: String,
    /// Opaque partner record echoed back on submission.
    #[serde(default)]
    pub partner_record: serde_json::Value,
}

/// Everything upstream needs to finalise a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Fresh per submission.
    pub request_id: Uuid,
    pub entry_id: String,
    pub color_id: String,
    pub usage_id: String,
    pub partner_id: String,
    pub partner_record: serde_json::Value,
    pub code: String,
    pub challenge_answer: String,
    pub challenge_token: String,
    pub quantity: u32,
}

/// What upstream answered to a submission.
///
/// Only the presence of a redirect token means success; anything else is a
/// rejection, whatever the message says.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub redirect_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmissionReceipt {
    /// Receipt carrying a redirect token.
    pub fn accepted(token: impl Into<String>) -> Self {
        Self {
            redirect_token: Some(token.into()),
            message: None,
        }
    }

    /// Receipt with no redirect token.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            redirect_token: None,
            message: Some(message.into()),
        }
    }

    /// The redirect token, if it is non-blank.
    pub fn success_token(&self) -> Option<&str> {
        self.redirect_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_success_token() {
        assert_eq!(SubmissionReceipt::accepted("abc").success_token(), Some("abc"));
        assert_eq!(SubmissionReceipt::accepted("  ").success_token(), None);
        assert_eq!(SubmissionReceipt::rejected("sold out").success_token(), None);
        assert_eq!(SubmissionReceipt::default().success_token(), None);
    }

    #[test]
    fn test_context_deserialize_without_record() {
        let json = r#"{"color_id": "3", "usage_id": "1", "partner_id": "77"}"#;
        let ctx: TransactionContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.partner_id, "77");
        assert!(ctx.partner_record.is_null());
    }
}
