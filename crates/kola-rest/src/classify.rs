//! Response classification.
//!
//! Pure mapping from (verb, status, error message) to what the client does
//! next. Kept free of I/O so the table can be tested directly.

use crate::error::RestError;
use crate::transport::Verb;

/// What to do with a response.
#[derive(Debug)]
pub enum Verdict {
    /// 2xx.
    Success,
    /// DELETE of something already gone, answer `null`.
    Gone,
    /// Retry after the tiered backoff.
    Retry(&'static str),
    /// 429: cancel open orders and wait for the reset.
    RateLimited,
    /// Raise without retrying.
    Fail(RestError),
}

/// Classify an HTTP response.
pub fn classify(verb: Verb, status: u16, message: &str) -> Verdict {
    match status {
        200..=299 => Verdict::Success,
        400 => classify_bad_request(message),
        401 => Verdict::Fail(RestError::Unauthorized(message.to_string())),
        404 if verb == Verb::Delete => Verdict::Gone,
        429 => Verdict::RateLimited,
        502 => Verdict::Retry("http_502"),
        503 => Verdict::Retry("http_503"),
        _ => Verdict::Fail(RestError::Http {
            status,
            message: message.to_string(),
        }),
    }
}

fn classify_bad_request(message: &str) -> Verdict {
    let lower = message.to_lowercase();
    let owned = || message.to_string();

    if lower.contains("duplicate clordid") {
        Verdict::Retry("duplicate_clordid")
    } else if lower.contains("request has expired") {
        Verdict::Retry("request_expired")
    } else if lower.contains("insufficient available balance") {
        Verdict::Fail(RestError::InsufficientBalance(owned()))
    } else if lower.contains("invalid ordstatus") {
        Verdict::Fail(RestError::InvalidOrdStatus(owned()))
    } else if lower.contains("invalid orderid") {
        Verdict::Fail(RestError::InvalidOrderId(owned()))
    } else if lower.contains("invalid orderqty") {
        Verdict::Fail(RestError::InvalidOrderQty(owned()))
    } else {
        Verdict::Fail(RestError::InvalidOrder(owned()))
    }
}

/// Error message of an exchange error body (`{"error": {"message": ..}}`),
/// the raw body otherwise.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn fail_kind(verdict: Verdict) -> ErrorKind {
        match verdict {
            Verdict::Fail(e) => e.kind(),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_request_table() {
        assert!(matches!(
            classify(Verb::Post, 400, "Duplicate clOrdID"),
            Verdict::Retry(_)
        ));
        assert!(matches!(
            classify(Verb::Put, 400, "This request has expired"),
            Verdict::Retry(_)
        ));
        assert_eq!(
            fail_kind(classify(Verb::Post, 400, "Account has insufficient Available Balance")),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            fail_kind(classify(Verb::Put, 400, "Invalid ordStatus")),
            ErrorKind::InvalidOrdStatus
        );
        assert_eq!(
            fail_kind(classify(Verb::Put, 400, "Invalid orderID")),
            ErrorKind::InvalidOrderId
        );
        assert_eq!(
            fail_kind(classify(Verb::Post, 400, "Invalid orderQty")),
            ErrorKind::InvalidOrderQty
        );
        assert_eq!(
            fail_kind(classify(Verb::Post, 400, "Price must be positive")),
            ErrorKind::InvalidOrder
        );
    }

    #[test]
    fn test_status_table() {
        assert!(matches!(classify(Verb::Get, 200, ""), Verdict::Success));
        assert_eq!(
            fail_kind(classify(Verb::Get, 401, "bad key")),
            ErrorKind::Unauthorized
        );
        assert!(matches!(classify(Verb::Delete, 404, ""), Verdict::Gone));
        assert_eq!(fail_kind(classify(Verb::Get, 404, "")), ErrorKind::Http);
        assert!(matches!(classify(Verb::Post, 429, ""), Verdict::RateLimited));
        assert!(matches!(classify(Verb::Post, 502, ""), Verdict::Retry(_)));
        assert!(matches!(classify(Verb::Post, 503, ""), Verdict::Retry(_)));
        assert_eq!(fail_kind(classify(Verb::Get, 500, "")), ErrorKind::Http);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Invalid ordStatus","name":"HTTPError"}}"#),
            "Invalid ordStatus"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
