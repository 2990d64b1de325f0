//! Faults a telemetry cycle can end in.

use airpost_delivery::{DeliveryError, LinkError};
use thiserror::Error;

/// Why a telemetry cycle did not deliver.
///
/// Only [`CycleFault::Configuration`] is fatal: the node halts telemetry
/// and keeps the diagnostic on the panel. Everything else is weathered
/// and the next cycle tries again.
#[derive(Debug, Error)]
pub enum CycleFault {
    /// The network interface is down.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The bounded retry policy ran out of broker connect attempts.
    #[error("broker connection failed after {attempts} attempts")]
    BrokerConnectionFailed { attempts: u32 },

    /// The delivery itself was refused or lost.
    #[error("publish failed: {0}")]
    PublishFailed(DeliveryError),

    /// The node is misconfigured; retrying cannot help.
    #[error("configuration fault: {0}")]
    Configuration(String),
}

impl CycleFault {
    /// Whether the node should stop running telemetry cycles.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleFault::Configuration(_))
    }
}

impl From<LinkError> for CycleFault {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NetworkUnavailable => CycleFault::NetworkUnavailable,
            LinkError::BrokerConnectionFailed { attempts } => {
                CycleFault::BrokerConnectionFailed { attempts }
            }
        }
    }
}

impl From<DeliveryError> for CycleFault {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Configuration { reason } => CycleFault::Configuration(reason),
            other => CycleFault::PublishFailed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_faults_are_fatal() {
        assert!(CycleFault::Configuration("bad endpoint".to_string()).is_fatal());
        assert!(!CycleFault::NetworkUnavailable.is_fatal());
        assert!(!CycleFault::BrokerConnectionFailed { attempts: 5 }.is_fatal());
    }

    #[test]
    fn link_errors_keep_their_attempt_count() {
        let fault = CycleFault::from(LinkError::BrokerConnectionFailed { attempts: 5 });
        assert!(matches!(
            fault,
            CycleFault::BrokerConnectionFailed { attempts: 5 }
        ));
    }

    #[test]
    fn delivery_configuration_errors_become_fatal() {
        let fault = CycleFault::from(DeliveryError::Configuration {
            reason: "feed account is empty".to_string(),
        });
        assert!(fault.is_fatal());

        let fault = CycleFault::from(DeliveryError::Fatal {
            reason: "collector answered 503".to_string(),
            status: Some(503),
        });
        assert!(!fault.is_fatal());
        assert!(matches!(fault, CycleFault::PublishFailed(_)));
    }
}
