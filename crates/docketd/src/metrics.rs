//! In-process request and response counters.
//!
//! Counters are keyed by their label set and exposed through
//! [`ConnMetrics::snapshot`] so an exporter, or a test, can read them.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Labels of `requests_total`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestLabels {
    /// Request op-code name.
    pub opcode: String,
    /// Command name, or `unknown`.
    pub command: String,
}

/// Labels of `responses_total`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResponseLabels {
    /// Response op-code name.
    pub opcode: String,
    /// Command name, or `unknown`.
    pub command: String,
    /// Offending argument of a failed command, or `unknown`.
    pub argument: String,
    /// `ok` or the error name.
    pub result: String,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// `requests_total` by label set.
    pub requests_total: BTreeMap<RequestLabels, u64>,
    /// `responses_total` by label set.
    pub responses_total: BTreeMap<ResponseLabels, u64>,
}

impl MetricsSnapshot {
    /// Sum of `requests_total` for one command.
    #[must_use]
    pub fn requests_for(&self, command: &str) -> u64 {
        self.requests_total
            .iter()
            .filter(|(labels, _)| labels.command == command)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Sum of `responses_total` for one command and result.
    #[must_use]
    pub fn responses_for(&self, command: &str, result: &str) -> u64 {
        self.responses_total
            .iter()
            .filter(|(labels, _)| labels.command == command && labels.result == result)
            .map(|(_, count)| *count)
            .sum()
    }
}

/// Counters shared by every connection of a server.
#[derive(Debug, Default)]
pub struct ConnMetrics {
    requests: Mutex<BTreeMap<RequestLabels, u64>>,
    responses: Mutex<BTreeMap<ResponseLabels, u64>>,
}

impl ConnMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request handled locally.
    pub fn record_request(&self, opcode: &str, command: &str) {
        let labels = RequestLabels {
            opcode: opcode.to_owned(),
            command: command.to_owned(),
        };
        *self.requests.lock().entry(labels).or_default() += 1;
    }

    /// Counts one locally produced response.
    pub fn record_response(&self, opcode: &str, command: &str, argument: &str, result: &str) {
        let labels = ResponseLabels {
            opcode: opcode.to_owned(),
            command: command.to_owned(),
            argument: argument.to_owned(),
            result: result.to_owned(),
        };
        *self.responses.lock().entry(labels).or_default() += 1;
    }

    /// Copies every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests.lock().clone(),
            responses_total: self.responses.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let metrics = ConnMetrics::new();
        metrics.record_request("OP_MSG", "ping");
        metrics.record_request("OP_MSG", "ping");
        metrics.record_request("OP_QUERY", "isMaster");
        metrics.record_response("OP_MSG", "ping", "unknown", "ok");
        metrics.record_response("OP_MSG", "find", "filter", "BadValue");

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.requests_for("ping"), 2);
        assert_eq!(snapshot.requests_for("isMaster"), 1);
        assert_eq!(snapshot.responses_for("ping", "ok"), 1);
        assert_eq!(snapshot.responses_for("find", "BadValue"), 1);
        assert_eq!(snapshot.responses_for("find", "ok"), 0);
    }
}
