use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::AddAssign;
use thiserror::Error;

/// Error code the API uses for an exhausted quota.
pub const RATE_LIMITED_CODE: i64 = 429;

/// Code recorded when every attempt ended in a dropped connection.
///
/// Server codes are HTTP-style positive integers, so a negative value can
/// never be confused with something the API sent.
pub const RETRIES_EXHAUSTED_CODE: i64 = -1;

/// Why a submission landed in the "other error" bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The API answered with an error object other than 429.
    Server { code: i64, message: String },
    /// The response body was not a JSON object we understand.
    Malformed(String),
    /// The request failed below HTTP and was not worth retrying.
    Transport(String),
    /// Every attempt ended in a dropped connection.
    RetriesExhausted { attempts: u32 },
}

impl Failure {
    /// Numeric code for this failure; internal failures have no server code
    /// and map to [`RETRIES_EXHAUSTED_CODE`] or `None`.
    pub fn code(&self) -> Option<i64> {
        match self {
            Failure::Server { code, .. } => Some(*code),
            Failure::RetriesExhausted { .. } => Some(RETRIES_EXHAUSTED_CODE),
            Failure::Malformed(_) | Failure::Transport(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Server { code, message } => write!(f, "server error {code}: {message}"),
            Failure::Malformed(detail) => write!(f, "malformed response: {detail}"),
            Failure::Transport(detail) => write!(f, "transport error: {detail}"),
            Failure::RetriesExhausted { attempts } => {
                write!(f, "connection dropped on all {attempts} attempts")
            }
        }
    }
}

/// Terminal result of one URL submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RateLimited,
    OtherError(Failure),
}

/// The body could not be interpreted as a publish response.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Classifies a raw publish response body.
///
/// An `error` object with code 429 is [`Outcome::RateLimited`], any other
/// code is [`Outcome::OtherError`], and a body without `error` is
/// [`Outcome::Success`]. Anything that is not a JSON object, or carries an
/// `error` that is not an object with a numeric `code`, is a [`ClassifyError`].
pub fn classify(body: &str) -> Result<Outcome, ClassifyError> {
    let mut response: Map<String, Value> = serde_json::from_str(body)?;

    let Some(error) = response.remove("error") else {
        return Ok(Outcome::Success);
    };
    if !error.is_object() {
        return Err(ClassifyError::InvalidJson(serde::de::Error::custom(
            "`error` is not an object",
        )));
    }

    let err: ApiError = serde_json::from_value(error)?;
    Ok(if err.code == RATE_LIMITED_CODE {
        Outcome::RateLimited
    } else {
        Outcome::OtherError(Failure::Server {
            code: err.code,
            message: err.message,
        })
    })
}

/// Total version of [`classify`]: a body that cannot be classified counts
/// as an error instead of disappearing from the totals.
pub fn classify_or_fail(body: &str) -> Outcome {
    match classify(body) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, body_len = body.len(), "Unparseable publish response");
            Outcome::OtherError(Failure::Malformed(e.to_string()))
        }
    }
}

/// Outcome counts for a set of submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub attempted: usize,
    pub successful: usize,
    pub rate_limited: usize,
    pub other_errors: usize,
}

impl BatchResult {
    pub fn record(&mut self, outcome: &Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Success => self.successful += 1,
            Outcome::RateLimited => self.rate_limited += 1,
            Outcome::OtherError(_) => self.other_errors += 1,
        }
    }
}

impl AddAssign for BatchResult {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.successful += rhs.successful;
        self.rate_limited += rhs.rate_limited;
        self.other_errors += rhs.other_errors;
    }
}

impl<'a> FromIterator<&'a Outcome> for BatchResult {
    fn from_iter<I: IntoIterator<Item = &'a Outcome>>(iter: I) -> Self {
        let mut result = BatchResult::default();
        for outcome in iter {
            result.record(outcome);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_empty_object_is_success() {
        assert_eq!(classify("{}").unwrap(), Outcome::Success);
    }

    #[test]
    fn test_success_shaped_body_is_success() {
        let body = r#"{"urlNotificationMetadata":{"url":"https://example.com/a","latestUpdate":{"type":"URL_UPDATED"}}}"#;
        assert_eq!(classify(body).unwrap(), Outcome::Success);
    }

    #[test]
    fn test_429_is_rate_limited() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify(body).unwrap(), Outcome::RateLimited);
    }

    #[test]
    fn test_other_code_is_other_error() {
        let body = r#"{"error":{"code":403,"message":"Permission denied"}}"#;
        assert_eq!(
            classify(body).unwrap(),
            Outcome::OtherError(Failure::Server {
                code: 403,
                message: "Permission denied".into()
            })
        );
    }

    #[test]
    fn test_error_without_message_still_classified() {
        let body = r#"{"error":{"code":500}}"#;
        match classify(body).unwrap() {
            Outcome::OtherError(f) => assert_eq!(f.code(), Some(500)),
            other => panic!("Expected OtherError, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_bodies_are_errors() {
        assert!(classify("").is_err());
        assert!(classify("<html>Bad Gateway</html>").is_err());
        assert!(classify("42").is_err());
        assert!(classify(r#"{"error":{"message":"no code"}}"#).is_err());
        assert!(classify(r#"{"error":{"code":"429"}}"#).is_err());
        assert!(classify(r#"{"error":null}"#).is_err());
        assert!(classify(r#"{"error":[429]}"#).is_err());
        assert!(classify("[]").is_err());
        assert!(classify("[null]").is_err());
    }

    #[test]
    fn test_classify_or_fail_counts_malformed_as_other() {
        match classify_or_fail("not json") {
            Outcome::OtherError(Failure::Malformed(_)) => {}
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_retries_exhausted_code_is_distinct() {
        let failure = Failure::RetriesExhausted { attempts: 3 };
        assert_eq!(failure.code(), Some(RETRIES_EXHAUSTED_CODE));
        assert!(RETRIES_EXHAUSTED_CODE < 0);
    }

    #[test]
    fn test_batch_result_from_outcomes() {
        let outcomes = vec![
            Outcome::Success,
            Outcome::Success,
            Outcome::RateLimited,
            Outcome::OtherError(Failure::Transport("timeout".into())),
        ];
        let result: BatchResult = outcomes.iter().collect();
        assert_eq!(
            result,
            BatchResult {
                attempted: 4,
                successful: 2,
                rate_limited: 1,
                other_errors: 1,
            }
        );
    }

    #[test]
    fn test_batch_result_add_assign() {
        let mut total = BatchResult {
            attempted: 3,
            successful: 1,
            rate_limited: 1,
            other_errors: 1,
        };
        total += BatchResult {
            attempted: 2,
            successful: 2,
            rate_limited: 0,
            other_errors: 0,
        };
        assert_eq!(total.attempted, 5);
        assert_eq!(total.successful, 3);
    }

    proptest! {
        #[test]
        fn prop_error_bodies_classify_by_code(code in any::<i64>(), message in "[a-zA-Z ]{0,40}") {
            let body = serde_json::json!({"error": {"code": code, "message": message}}).to_string();
            let first = classify(&body).unwrap();
            let second = classify(&body).unwrap();
            prop_assert_eq!(&first, &second);
            if code == RATE_LIMITED_CODE {
                prop_assert_eq!(first, Outcome::RateLimited);
            } else {
                let is_other = matches!(first, Outcome::OtherError(Failure::Server { .. }));
                prop_assert!(is_other);
            }
        }

        #[test]
        fn prop_any_input_yields_exactly_one_bucket(body in ".*") {
            let outcome = classify_or_fail(&body);
            let result: BatchResult = std::iter::once(&outcome).collect();
            prop_assert_eq!(result.attempted, 1);
            prop_assert_eq!(result.successful + result.rate_limited + result.other_errors, 1);
            prop_assert_eq!(outcome, classify_or_fail(&body));
        }
    }
}
