//! Structured error payloads for the request layer.

use serde_json::{Value as JsonValue, json};

use tamirhane_core::DomainError;

/// `{ "error": code, "field": field?, "message": display, "retryable": bool }`.
pub fn error_payload(err: &DomainError) -> JsonValue {
    let mut payload = json!({
        "error": err.code(),
        "message": err.to_string(),
        "retryable": err.is_retryable(),
    });
    if let (Some(field), Some(obj)) = (err.field(), payload.as_object_mut()) {
        obj.insert("field".to_string(), JsonValue::from(field));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_carry_their_field() {
        let payload = error_payload(&DomainError::unknown_account("debit_code", "9999"));
        assert_eq!(payload["error"], "unknown_account");
        assert_eq!(payload["field"], "debit_code");
        assert_eq!(payload["retryable"], false);
        assert!(payload["message"].as_str().unwrap().contains("9999"));
    }

    #[test]
    fn aborted_transactions_are_retryable_and_fieldless() {
        let payload = error_payload(&DomainError::aborted("serialization failure"));
        assert_eq!(payload["error"], "transaction_aborted");
        assert_eq!(payload["retryable"], true);
        assert!(payload.get("field").is_none());
    }
}
