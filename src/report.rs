//! Fault rendering for the node's status panel.
//!
//! The panel is modelled on an eight-line hardware display, so every
//! renderer here returns at most [`MAX_LINES`] short lines. All of them
//! are pure functions of the fault and its metadata; the node decides
//! when to show them and the panel decides how.

use std::net::IpAddr;
use std::time::Duration;

use airpost_delivery::DeliveryError;

/// Line budget of the status panel.
pub const MAX_LINES: usize = 8;

/// Everything the outage diagnostic says about the delivery path.
#[derive(Debug, Clone)]
pub struct LinkReport<'a> {
    /// Local interface address, when the link knows one.
    pub local_ip: Option<IpAddr>,
    /// The node's hostname.
    pub hostname: &'a str,
    /// Whether the network layer is up (the broker may still be down).
    pub network_up: bool,
    /// Remote endpoint the node is trying to reach.
    pub endpoint: &'a str,
    /// Account or device identity the node publishes as.
    pub identity: &'a str,
    /// Time until the next connect attempt.
    pub retry_in: Duration,
}

/// Full diagnostic for a broker that cannot be reached.
pub fn broker_unreachable(report: &LinkReport<'_>) -> Vec<String> {
    let ip = match report.local_ip {
        Some(ip) => ip.to_string(),
        None => "unknown".to_string(),
    };
    vec![
        "Couldn't connect".to_string(),
        "to the broker".to_string(),
        format!("IP: {}", ip),
        format!("Host: {}", report.hostname),
        format!("Network up: {}", report.network_up),
        format!("Retrying in {}s", report.retry_in.as_secs()),
        report.endpoint.to_string(),
        report.identity.to_string(),
    ]
}

/// Shown when the network interface itself drops.
pub fn network_lost() -> Vec<String> {
    vec![
        "Network connection lost!".to_string(),
        "Reconnecting...".to_string(),
    ]
}

/// Shown when the collector refuses or loses a delivery. The next
/// cycle retries from scratch, so `retry_in` is the cycle period.
pub fn publish_failed(err: &DeliveryError, endpoint: &str, retry_in: Duration) -> Vec<String> {
    let mut lines = vec!["Delivery failed".to_string()];
    if let Some(status) = err.status() {
        lines.push(format!("Status: {}", status));
    }
    lines.push(endpoint.to_string());
    lines.push(format!("Retrying in {}s", retry_in.as_secs()));
    lines
}

/// Persistent diagnostic for a node halted by a configuration fault.
pub fn configuration_halt(reason: &str) -> Vec<String> {
    vec![
        "Configuration fault".to_string(),
        reason.to_string(),
        "Telemetry halted".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    fn report() -> LinkReport<'static> {
        LinkReport {
            local_ip: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 61))),
            hostname: "airpost-node",
            network_up: true,
            endpoint: "io.adafruit.com:1883",
            identity: "acct",
            retry_in: Duration::from_secs(15),
        }
    }

    #[test]
    fn broker_unreachable_fills_the_panel() {
        let lines = broker_unreachable(&report());
        assert_eq!(
            lines,
            vec![
                "Couldn't connect",
                "to the broker",
                "IP: 192.168.4.61",
                "Host: airpost-node",
                "Network up: true",
                "Retrying in 15s",
                "io.adafruit.com:1883",
                "acct",
            ]
        );
    }

    #[test]
    fn a_missing_address_reads_as_unknown() {
        let mut ctx = report();
        ctx.local_ip = None;
        assert_eq!(broker_unreachable(&ctx)[2], "IP: unknown");
    }

    #[test]
    fn network_lost_is_a_two_line_notice() {
        assert_eq!(network_lost(), vec!["Network connection lost!", "Reconnecting..."]);
    }

    #[test]
    fn publish_failed_names_the_status_when_it_has_one() {
        let err = DeliveryError::Fatal {
            reason: "collector answered 503".to_string(),
            status: Some(503),
        };
        let lines = publish_failed(
            &err,
            "http://collector.local:3000/logData/",
            Duration::from_secs(15),
        );
        assert_eq!(
            lines,
            vec![
                "Delivery failed",
                "Status: 503",
                "http://collector.local:3000/logData/",
                "Retrying in 15s",
            ]
        );

        let transport = DeliveryError::Fatal {
            reason: "connection refused".to_string(),
            status: None,
        };
        let lines = publish_failed(&transport, "x", Duration::from_secs(15));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Retrying in 15s");
    }

    #[test]
    fn every_renderer_respects_the_line_budget() {
        let err = DeliveryError::Fatal {
            reason: "refused".to_string(),
            status: Some(500),
        };
        assert!(broker_unreachable(&report()).len() <= MAX_LINES);
        assert!(network_lost().len() <= MAX_LINES);
        assert!(publish_failed(&err, "endpoint", Duration::from_secs(15)).len() <= MAX_LINES);
        assert!(configuration_halt("collector endpoint 'x': invalid").len() <= MAX_LINES);
    }
}
