//! The quarantine boundary and the bounded intake queue
//!
//! Raw external text — Seeker petitions, operator notes — never reaches
//! an event body. It passes through the quarantine summarizer, which
//! produces a structured, schema-validated, size-bounded summary; only
//! the summary is admissible downstream.
//!
//! Intake is bounded. Overflow is a recorded breach and closes intake
//! for the cycle; nothing is dropped silently.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use conclave_types::{ConclaveError, PetitionId, Result, Timestamp};

/// Upper bound on raw petition text accepted at the boundary, in bytes
pub const MAX_RAW_PETITION_BYTES: usize = 64 * 1024;
/// Upper bound on a quarantined summary, in bytes
pub const MAX_SUMMARY_BYTES: usize = 1024;

/// The structured output of the quarantine summarizer. This, and only
/// this, is what deliberating agents see of external input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarantineSummary {
    pub petition_id: PetitionId,
    /// Sanitized, bounded summary text
    pub summary: String,
    /// Length of the raw source in bytes (the raw text itself is gone)
    pub source_len: usize,
    pub submitted_at: Timestamp,
}

/// Run raw text through the quarantine boundary.
///
/// Control characters are stripped, whitespace is collapsed, and the
/// result is truncated to the summary bound. Empty or oversized input is
/// a schema violation.
pub fn quarantine(raw: &str, submitted_at: Timestamp) -> Result<QuarantineSummary> {
    if raw.len() > MAX_RAW_PETITION_BYTES {
        return Err(ConclaveError::schema(format!(
            "petition of {} bytes exceeds the intake bound",
            raw.len()
        )));
    }

    let mut sanitized = String::with_capacity(raw.len().min(MAX_SUMMARY_BYTES));
    let mut last_was_space = true;
    for c in raw.chars() {
        let c = if c.is_whitespace() { ' ' } else { c };
        if c.is_control() {
            continue;
        }
        if c == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        sanitized.push(c);
        if sanitized.len() >= MAX_SUMMARY_BYTES {
            break;
        }
    }
    let summary = sanitized.trim().to_string();

    if summary.is_empty() {
        return Err(ConclaveError::schema("petition is empty after quarantine"));
    }

    Ok(QuarantineSummary {
        petition_id: PetitionId::new(),
        summary,
        source_len: raw.len(),
        submitted_at,
    })
}

/// What happened to a submitted petition.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// Admitted to the queue
    Admitted(PetitionId),
    /// Queue full: intake is closed for the cycle and a breach records it
    Overrun,
    /// Intake was already closed by an earlier overrun
    Closed,
}

/// The bounded per-cycle intake queue.
#[derive(Debug)]
pub struct IntakeQueue {
    items: VecDeque<QuarantineSummary>,
    capacity: usize,
    closed: bool,
}

impl IntakeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            closed: false,
        }
    }

    /// Offer a quarantined summary. Overflow closes intake for the cycle.
    pub fn offer(&mut self, summary: QuarantineSummary) -> IntakeOutcome {
        if self.closed {
            return IntakeOutcome::Closed;
        }
        if self.items.len() >= self.capacity {
            self.closed = true;
            return IntakeOutcome::Overrun;
        }
        let id = summary.petition_id.clone();
        self.items.push_back(summary);
        IntakeOutcome::Admitted(id)
    }

    /// Take the next item for deliberation
    pub fn next(&mut self) -> Option<QuarantineSummary> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> Timestamp {
        Timestamp::from_micros(1_000)
    }

    #[test]
    fn test_quarantine_sanitizes() {
        let summary = quarantine("  a\tpetition\n\nwith   gaps \u{0007} ", t()).unwrap();
        assert_eq!(summary.summary, "a petition with gaps");
    }

    #[test]
    fn test_quarantine_bounds_output() {
        let raw = "x".repeat(10_000);
        let summary = quarantine(&raw, t()).unwrap();
        assert!(summary.summary.len() <= MAX_SUMMARY_BYTES);
        assert_eq!(summary.source_len, 10_000);
    }

    #[test]
    fn test_quarantine_rejects_empty() {
        assert!(quarantine("", t()).is_err());
        assert!(quarantine(" \n\t ", t()).is_err());
    }

    #[test]
    fn test_quarantine_rejects_oversized_raw() {
        let raw = "x".repeat(MAX_RAW_PETITION_BYTES + 1);
        assert!(matches!(
            quarantine(&raw, t()),
            Err(ConclaveError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_queue_admits_until_capacity() {
        let mut queue = IntakeQueue::new(2);
        assert!(matches!(
            queue.offer(quarantine("one", t()).unwrap()),
            IntakeOutcome::Admitted(_)
        ));
        assert!(matches!(
            queue.offer(quarantine("two", t()).unwrap()),
            IntakeOutcome::Admitted(_)
        ));
        assert_eq!(queue.offer(quarantine("three", t()).unwrap()), IntakeOutcome::Overrun);
        assert!(queue.is_closed());
        assert_eq!(queue.offer(quarantine("four", t()).unwrap()), IntakeOutcome::Closed);
        // Nothing was silently dropped: the two admitted items remain
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_drains_in_order() {
        let mut queue = IntakeQueue::new(4);
        queue.offer(quarantine("first", t()).unwrap());
        queue.offer(quarantine("second", t()).unwrap());
        assert_eq!(queue.next().unwrap().summary, "first");
        assert_eq!(queue.next().unwrap().summary, "second");
        assert!(queue.next().is_none());
    }
}
