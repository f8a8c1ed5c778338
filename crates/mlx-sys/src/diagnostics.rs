//! Diagnostic sink for failures caught at the boundary.
//!
//! Every failure is emitted as a `tracing` error event and kept in a bounded
//! in-process history, most recent last.

use std::collections::VecDeque;
use std::sync::LazyLock;

use parking_lot::Mutex;

use crate::config::config;

/// One failure caught by an entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub entry: &'static str,
    pub message: String,
}

static HISTORY: LazyLock<Mutex<VecDeque<Diagnostic>>> =
    LazyLock::new(|| Mutex::new(VecDeque::with_capacity(config().diag_history)));

pub(crate) fn record(entry: &'static str, message: String) {
    tracing::error!(entry, error = %message, "Caught exception");
    if config().echo_errors {
        eprintln!("Caught exception: '{message}'");
    }

    let capacity = config().diag_history;
    if capacity == 0 {
        return;
    }
    let mut history = HISTORY.lock();
    while history.len() >= capacity {
        history.pop_front();
    }
    history.push_back(Diagnostic { entry, message });
}

/// Recorded failures, oldest first.
pub fn recent() -> Vec<Diagnostic> {
    HISTORY.lock().iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_history_is_bounded() {
        let cap = config().diag_history;
        for i in 0..cap + 5 {
            record("test_history", format!("failure {i}"));
        }
        let all = recent();
        assert_eq!(all.len(), cap);
        let ours: Vec<&str> = all
            .iter()
            .filter(|d| d.entry == "test_history")
            .map(|d| d.message.as_str())
            .collect();
        assert!(!ours.contains(&"failure 0"));
        assert_eq!(ours.last().copied(), Some(format!("failure {}", cap + 4)).as_deref());
    }
}
