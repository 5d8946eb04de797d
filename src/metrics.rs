//! Inbound email counters.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome label for an inbound email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailAction {
    Accepted,
    Rejected,
}

impl EmailAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Accepted/rejected counters, shared across handlers.
#[derive(Debug, Default)]
pub struct IncomingEmailMetrics {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl IncomingEmailMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: EmailAction) {
        let counter = match action {
            EmailAction::Accepted => &self.accepted,
            EmailAction::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, action: EmailAction) -> u64 {
        match action {
            EmailAction::Accepted => self.accepted.load(Ordering::Relaxed),
            EmailAction::Rejected => self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Render in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP burner_incoming_emails_total Inbound emails by outcome.\n");
        out.push_str("# TYPE burner_incoming_emails_total counter\n");
        for action in [EmailAction::Accepted, EmailAction::Rejected] {
            let _ = writeln!(
                out,
                "burner_incoming_emails_total{{action=\"{}\"}} {}",
                action.as_str(),
                self.get(action)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_action() {
        let m = IncomingEmailMetrics::new();
        m.record(EmailAction::Accepted);
        m.record(EmailAction::Accepted);
        m.record(EmailAction::Rejected);
        assert_eq!(m.get(EmailAction::Accepted), 2);
        assert_eq!(m.get(EmailAction::Rejected), 1);
    }

    #[test]
    fn render_exposition() {
        let m = IncomingEmailMetrics::new();
        m.record(EmailAction::Rejected);
        let text = m.render();
        assert!(text.contains("burner_incoming_emails_total{action=\"accepted\"} 0\n"));
        assert!(text.contains("burner_incoming_emails_total{action=\"rejected\"} 1\n"));
    }
}
