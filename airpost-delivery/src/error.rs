//! Error types for delivery backends and link management.

use thiserror::Error;

/// Outcome of a failed delivery or initialization attempt.
///
/// The node inspects the variant to decide how loudly to report.
/// `Transient` and `Fatal` are both retried by the next telemetry cycle;
/// the split exists so diagnostics can distinguish "the network hiccuped"
/// from "the collector said no". `Configuration` is the one kind retrying
/// cannot fix.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The backend was wired up with settings it cannot work with.
    ///
    /// Usually raised during initialization. The node treats this as
    /// fatal and stops cycling.
    #[error("configuration rejected: {reason}")]
    Configuration { reason: String },

    /// The attempt failed in a way the next cycle may well recover from.
    #[error("transient delivery failure: {reason}")]
    Transient { reason: String },

    /// The endpoint refused the attempt, or the transport failed outright.
    ///
    /// `status` carries the HTTP status code when the refusal was an HTTP
    /// response; transport-level failures have no status.
    #[error("delivery failed: {reason}")]
    Fatal { reason: String, status: Option<u16> },
}

impl DeliveryError {
    /// The HTTP status code behind this failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Fatal { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failures escalated by a readiness check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The network link is down; nothing was attempted beyond the check.
    #[error("network link unavailable")]
    NetworkUnavailable,

    /// Broker connect attempts hit the configured ceiling.
    #[error("broker connection failed after {attempts} attempts")]
    BrokerConnectionFailed { attempts: u32 },
}

// Transport failures (refused connections, timeouts) fail the delivery
// outright; none of them carry a status code.
#[cfg(feature = "http")]
impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Fatal {
            reason: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_carried_by_fatal_only() {
        let fatal = DeliveryError::Fatal {
            reason: "collector answered 503".to_string(),
            status: Some(503),
        };
        assert_eq!(fatal.status(), Some(503));

        let transient = DeliveryError::Transient {
            reason: "request timed out".to_string(),
        };
        assert_eq!(transient.status(), None);
    }

    #[test]
    fn display_names_the_cause() {
        let err = DeliveryError::Configuration {
            reason: "feed account is empty".to_string(),
        };
        assert_eq!(err.to_string(), "configuration rejected: feed account is empty");

        let err = LinkError::BrokerConnectionFailed { attempts: 5 };
        assert_eq!(err.to_string(), "broker connection failed after 5 attempts");

        assert_eq!(
            LinkError::NetworkUnavailable.to_string(),
            "network link unavailable"
        );
    }
}
