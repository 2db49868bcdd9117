//! Translate execution failures into the client's error envelope.

use query_engine_execution::{Diagnostics, Error};
use serde::{Deserialize, Serialize};

/// Used when the failure carries no message at all.
pub const UNKNOWN_MESSAGE: &str = "Unknown error";
/// Used when neither a SQLSTATE nor a driver classification is available.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// The diagnostic envelope sent to clients. Only `message` and `code` are
/// always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub message: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl ErrorEnvelope {
    /// An envelope with only a message and a code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope {
            message: message.into(),
            code: code.into(),
            severity: None,
            detail: None,
            hint: None,
            position: None,
            r#where: None,
            schema: None,
            table: None,
            column: None,
            data_type: None,
            constraint: None,
        }
    }

    /// Build an envelope from backend diagnostics. `kind` is the fallback code
    /// when the backend sent no SQLSTATE.
    pub fn from_diagnostics(diagnostics: &Diagnostics, kind: Option<&str>) -> ErrorEnvelope {
        let message = diagnostics
            .message
            .as_deref()
            .filter(|message| !message.is_empty())
            .unwrap_or(UNKNOWN_MESSAGE);
        let code = diagnostics
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .or(kind)
            .unwrap_or(UNKNOWN_CODE);
        ErrorEnvelope {
            severity: diagnostics.severity.clone(),
            detail: diagnostics.detail.clone(),
            hint: diagnostics.hint.clone(),
            position: diagnostics.position.clone(),
            r#where: diagnostics.r#where.clone(),
            schema: diagnostics.schema.clone(),
            table: diagnostics.table.clone(),
            column: diagnostics.column.clone(),
            data_type: diagnostics.data_type.clone(),
            constraint: diagnostics.constraint.clone(),
            ..ErrorEnvelope::new(message, code)
        }
    }
}

/// Translate an execution error. This never fails: missing fields fall back to
/// fixed placeholders.
pub fn translate(error: &Error) -> ErrorEnvelope {
    let envelope = match error.diagnostics() {
        Some(diagnostics) => ErrorEnvelope::from_diagnostics(diagnostics, Some(error.kind())),
        None => {
            let message = error.to_string();
            let message = if message.is_empty() {
                UNKNOWN_MESSAGE.to_string()
            } else {
                message
            };
            ErrorEnvelope::new(message, error.kind())
        }
    };
    tracing::debug!(code = %envelope.code, message = %envelope.message, "translated error");
    envelope
}

/// Translate a failure to encode a result.
pub fn translate_encoding(error: &crate::translation::result::Error) -> ErrorEnvelope {
    ErrorEnvelope::new(error.to_string(), "encoding")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unique_violations_keep_their_sqlstate() {
        let error = Error::Database(Diagnostics {
            message: Some(
                "duplicate key value violates unique constraint \"users_email_key\"".to_string(),
            ),
            code: Some("23505".to_string()),
            severity: Some("ERROR".to_string()),
            detail: Some("Key (email)=(a@example.com) already exists.".to_string()),
            schema: Some("public".to_string()),
            table: Some("users".to_string()),
            constraint: Some("users_email_key".to_string()),
            ..Diagnostics::default()
        });
        let envelope = translate(&error);
        insta::assert_json_snapshot!(envelope, @r###"
        {
          "message": "duplicate key value violates unique constraint \"users_email_key\"",
          "code": "23505",
          "severity": "ERROR",
          "detail": "Key (email)=(a@example.com) already exists.",
          "schema": "public",
          "table": "users",
          "constraint": "users_email_key"
        }
        "###);
    }

    #[test]
    fn missing_message_and_code_use_placeholders() {
        let envelope = ErrorEnvelope::from_diagnostics(&Diagnostics::default(), None);
        assert_eq!(envelope.message, UNKNOWN_MESSAGE);
        assert_eq!(envelope.code, UNKNOWN_CODE);
    }

    #[test]
    fn driver_kind_is_the_fallback_code() {
        let envelope = translate(&pool_timeout());
        assert_eq!(envelope.code, "pool_timed_out");
        assert!(!envelope.message.is_empty());

        let envelope = ErrorEnvelope::from_diagnostics(
            &Diagnostics {
                message: Some("boom".to_string()),
                ..Diagnostics::default()
            },
            Some("database"),
        );
        assert_eq!(envelope.code, "database");
    }

    fn pool_timeout() -> Error {
        Error::Driver {
            kind: "pool_timed_out",
            message: "pool timed out while waiting for an open connection".to_string(),
        }
    }

    #[test]
    fn invalid_parameters_are_classified() {
        let envelope = translate(&Error::InvalidParameter {
            index: 2,
            message: "invalid input syntax for type integer: \"x\"".to_string(),
        });
        assert_eq!(envelope.code, "invalid_parameter");
        assert!(envelope.message.contains("$2"));
    }

    #[test]
    fn encoding_failures_are_classified() {
        let envelope = translate_encoding(&crate::translation::result::Error::RowWidthMismatch {
            row: 3,
            expected: 1,
            found: 2,
        });
        assert_eq!(envelope.code, "encoding");
        assert_eq!(envelope.message, "row 3 has 2 columns but the result has 1");
    }

    #[test]
    fn optional_fields_are_omitted_and_renamed() {
        let mut envelope = ErrorEnvelope::new("bad", "22P02");
        envelope.data_type = Some("integer".to_string());
        envelope.r#where = Some("SQL function".to_string());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "message": "bad",
                "code": "22P02",
                "where": "SQL function",
                "dataType": "integer",
            })
        );
    }
}
