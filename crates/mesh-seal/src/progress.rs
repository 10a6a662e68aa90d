//! Progress reporting for repair runs.
//!
//! The core reports progress through write-only sinks: it never reads
//! anything back, and a repair behaves identically whether or not a sink is
//! attached. The periodic emission inside the hole-fill loop doubles as the
//! cooperative yield point for hosts interleaving many large repairs; this
//! implementation is synchronous, so the yield is a no-op.

use crate::repair::RepairReport;
use crate::validate::Diagnosis;

/// Write-only receiver for human-readable status lines from one repair.
///
/// Implemented for any `Fn(&str)` closure.
pub trait ProgressSink {
    /// Called at stage boundaries and periodically while filling holes.
    fn status(&self, message: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn status(&self, message: &str) {
        self(message)
    }
}

/// Event emitted by [`repair_all`](crate::repair::repair_all) as it walks a
/// batch of objects.
///
/// Status strings are for humans; only the structure and counters are part
/// of the machine contract.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BatchEvent {
    /// An object's repair is starting.
    Start {
        index: usize,
        object_id: String,
        total: usize,
        status: String,
    },

    /// A stage boundary or periodic update inside one object's repair.
    Progress {
        index: usize,
        object_id: String,
        total: usize,
        status: String,
    },

    /// An object's repair finished.
    Done {
        index: usize,
        object_id: String,
        total: usize,
        report: RepairReport,
        diagnosis: Diagnosis,
        status: String,
    },
}

/// Write-only receiver for batch events.
///
/// Implemented for any `Fn(&BatchEvent)` closure.
pub trait BatchSink {
    fn event(&self, event: &BatchEvent);
}

impl<F: Fn(&BatchEvent)> BatchSink for F {
    fn event(&self, event: &BatchEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closures_are_sinks() {
        let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let sink = |message: &str| lines.borrow_mut().push(message.to_owned());

        let as_dyn: &dyn ProgressSink = &sink;
        as_dyn.status("welding");
        as_dyn.status("filtering");

        assert_eq!(lines.into_inner(), vec!["welding", "filtering"]);
    }

    #[test]
    fn test_batch_event_carries_identity() {
        let seen: RefCell<Vec<usize>> = RefCell::new(Vec::new());
        let sink = |event: &BatchEvent| {
            if let BatchEvent::Start { index, .. } = event {
                seen.borrow_mut().push(*index);
            }
        };

        let as_dyn: &dyn BatchSink = &sink;
        as_dyn.event(&BatchEvent::Start {
            index: 3,
            object_id: "part".to_owned(),
            total: 5,
            status: "repairing part".to_owned(),
        });

        assert_eq!(seen.into_inner(), vec![3]);
    }
}
