//! Listener that counts notifications during a measurement window.
//!
//! One counter type serves every notification stream; the [`EventKind`] it is
//! built with only names it in reports. A window runs from construction (or
//! the previous [`EventCounter::verify`]) to the next `verify`, which checks
//! the count against a tolerated range and always resets it.
//!
//! Ranges rather than exact counts absorb notifications that are themselves
//! delivered asynchronously and may land just before or just after the wait
//! that triggered them returns.

use crate::report::{Report, ReportSink};
use crate::service::{EventKind, EventListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

pub struct EventCounter {
    kind: EventKind,
    count: AtomicU32,
    sink: Arc<dyn ReportSink>,
}

impl EventCounter {
    pub fn new(kind: EventKind, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            kind,
            count: AtomicU32::new(0),
            sink,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Notifications received in the current window.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn on_notified(&self) {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("On{}Changed (changes {})", self.kind, count);
    }

    /// Report whether the window's count lies in `min..=max`, then reset it.
    pub fn verify(&self, label: &str, min: u32, max: u32) -> bool {
        let count = self.count.swap(0, Ordering::SeqCst);
        let success = min <= count && count <= max;
        self.sink.emit(&Report::CounterVerified {
            kind: self.kind,
            label: label.to_string(),
            count,
            min,
            max,
            success,
        });
        success
    }

    pub fn verify_exact(&self, label: &str, expected: u32) -> bool {
        self.verify(label, expected, expected)
    }
}

impl EventListener for EventCounter {
    fn on_notified(&self, kind: EventKind) {
        if kind != self.kind {
            tracing::warn!(
                "{}Listener received a {} notification; counting it anyway",
                self.kind,
                kind
            );
        }
        EventCounter::on_notified(self);
    }
}

impl std::fmt::Debug for EventCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCounter")
            .field("kind", &self.kind)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReportSink;

    fn counter() -> (EventCounter, Arc<RecordingReportSink>) {
        let sink = Arc::new(RecordingReportSink::new());
        (EventCounter::new(EventKind::IdToken, sink.clone()), sink)
    }

    #[test]
    fn test_empty_window_verifies_zero() {
        let (counter, sink) = counter();
        assert!(counter.verify_exact("registration", 0));
        assert!(sink.failures().is_empty());
    }

    #[test]
    fn test_notifications_through_listener_trait() {
        let (counter, _sink) = counter();
        let listener: &dyn EventListener = &counter;
        listener.on_notified(EventKind::IdToken);
        listener.on_notified(EventKind::IdToken);
        assert_eq!(counter.count(), 2);
        assert!(counter.verify_exact("GetToken()", 2));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_failed_verify_reports_observed_and_range() {
        let (counter, sink) = counter();
        for _ in 0..4 {
            counter.on_notified();
        }
        assert!(!counter.verify("sign in", 0, 2));

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].to_string(),
            "ERROR: IdTokenListener called 4 times on sign in. (expected 0-2)"
        );
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_concurrent_notifications_are_not_lost() {
        let (counter, _sink) = counter();
        let counter = Arc::new(counter);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        counter.on_notified();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(counter.verify_exact("threads", 400));
    }
}
