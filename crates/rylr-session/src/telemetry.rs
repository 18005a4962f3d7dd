//! Session counters.
//!
//! Counters are recorded through the [`metrics`] facade. Nothing is exported
//! unless the embedding program installs a recorder.

use metrics::{describe_counter, Unit};

/// A counter declaration with its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    /// Metric name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

impl Metric {
    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Metric {
            name,
            description: "",
        }
    }

    /// Attach a description.
    pub const fn with_description(self, description: &'static str) -> Self {
        Metric { description, ..self }
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, Unit::Count, self.description);
    }

    /// Increment the counter by one.
    pub fn increment(&self) {
        metrics::counter!(self.name).increment(1);
    }
}

/// All counters recorded by the session layer.
pub mod metric_defs {
    use super::Metric;

    /// Commands written to the module.
    pub const COMMANDS_SENT: Metric = Metric::counter("rylr.commands.sent")
        .with_description("AT commands written to the module");

    /// Commands that timed out or were rejected.
    pub const COMMANDS_FAILED: Metric = Metric::counter("rylr.commands.failed")
        .with_description("AT commands that got no reply or an error code");

    /// Lines read from the module.
    pub const LINES_RECEIVED: Metric = Metric::counter("rylr.lines.received")
        .with_description("Non-empty lines read from the module");

    /// Inbound messages decoded.
    pub const MESSAGES_RECEIVED: Metric = Metric::counter("rylr.messages.received")
        .with_description("Inbound radio messages decoded");

    /// Inbound announcements that could not be decoded.
    pub const FRAMING_ERRORS: Metric = Metric::counter("rylr.messages.framing_errors")
        .with_description("Inbound announcements discarded as malformed");

    /// Replies transmitted.
    pub const REPLIES_SENT: Metric = Metric::counter("rylr.replies.sent")
        .with_description("Replies acknowledged by the module");

    /// Replies that failed to transmit.
    pub const REPLIES_FAILED: Metric = Metric::counter("rylr.replies.failed")
        .with_description("Replies that got no reply or an error code");

    /// Local command executions that failed to start.
    pub const EXECUTOR_FAILURES: Metric = Metric::counter("rylr.executor.failures")
        .with_description("Remote commands that could not be executed");

    /// Every counter, for registration.
    pub const ALL: &[Metric] = &[
        COMMANDS_SENT,
        COMMANDS_FAILED,
        LINES_RECEIVED,
        MESSAGES_RECEIVED,
        FRAMING_ERRORS,
        REPLIES_SENT,
        REPLIES_FAILED,
        EXECUTOR_FAILURES,
    ];
}

/// Register descriptions for every session counter.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        metric_defs::COMMANDS_SENT.increment();
    }
}
