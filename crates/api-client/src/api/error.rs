//! Error taxonomy for the fallback client.
//!
//! Per-endpoint failures are ordinary values threaded through the fallback
//! loop, not propagated errors; only registry problems and full exhaustion
//! reach the caller.

use shared::RegistryError;
use thiserror::Error;

/// Outcome of one attempt against one endpoint.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Connection refused, DNS failure, or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx status from the upstream.
    #[error("upstream returned HTTP {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// 2xx status but the body was not valid JSON.
    #[error("unreadable response body: {0}")]
    Body(String),

    /// Skipped without a network call, backoff window still open.
    #[error("skipped, in backoff for {0}s more")]
    Suppressed(u64),
}

/// One entry in the exhaustion diagnostics.
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: AttemptError,
}

/// Failure of a whole `request()` call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Every active endpoint failed or sat in backoff. Carries the full
    /// per-endpoint outcome list so callers can log or display it.
    #[error("all endpoints failed: {}", summarize(.attempts))]
    AllEndpointsFailed { attempts: Vec<EndpointFailure> },
}

fn summarize(attempts: &[EndpointFailure]) -> String {
    if attempts.is_empty() {
        return "no active endpoints configured".to_string();
    }

    attempts
        .iter()
        .map(|a| format!("{}: {}", a.endpoint, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_message_lists_endpoints() {
        let error = FetchError::AllEndpointsFailed {
            attempts: vec![
                EndpointFailure {
                    endpoint: "Primary".to_string(),
                    error: AttemptError::Transport("connection refused".to_string()),
                },
                EndpointFailure {
                    endpoint: "Backup".to_string(),
                    error: AttemptError::Upstream {
                        status: 503,
                        detail: "maintenance".to_string(),
                    },
                },
            ],
        };

        let text = error.to_string();
        assert!(text.contains("Primary"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("Backup"));
        assert!(text.contains("503"));
    }

    #[test]
    fn test_empty_attempts_message() {
        let error = FetchError::AllEndpointsFailed { attempts: vec![] };
        assert!(error.to_string().contains("no active endpoints"));
    }
}
