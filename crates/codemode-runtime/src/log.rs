use std::sync::{Arc, Mutex, PoisonError};

/// Ordered log shared by the console globals and the capability proxy of
/// one script run.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl ScriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.into());
    }

    /// Copy of every line recorded so far, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_log() {
        let log = ScriptLog::new();
        let other = log.clone();
        log.push("first");
        other.push("second");

        assert_eq!(log.snapshot(), vec!["first", "second"]);
        assert_eq!(other.len(), 2);
    }
}
