//! Precedent citation and challenge workflow
//!
//! Citations are attribution, not authority: every citation carries
//! `binding = false` literally, and a challenge is a first-class event
//! rather than a reply. This module builds the bodies; the pipeline
//! appends them.

use conclave_types::{
    ActorId, EventBody, EventId, PrecedentChallengedBody, PrecedentCitation,
};

/// The structured kind string used when the collusion monitor escalates.
pub const WITNESS_ANOMALY_KIND: &str = "witness-anomaly";

/// Build a citation body. `binding` cannot be supplied: it is false by
/// construction.
pub fn cite(citer_id: ActorId, cited_event_id: EventId, grounds: impl Into<String>) -> EventBody {
    EventBody::PrecedentCited(PrecedentCitation {
        citer_id,
        cited_event_id,
        grounds: grounds.into(),
        binding: false,
    })
}

/// Build a witness-anomaly citation from the collusion monitor's finding.
pub fn cite_witness_anomaly(
    citer_id: ActorId,
    cited_event_id: EventId,
    frequency: f64,
    observations: u32,
) -> EventBody {
    cite(
        citer_id,
        cited_event_id,
        format!(
            "{}: pair co-signed {} times at frequency {:.2}",
            WITNESS_ANOMALY_KIND, observations, frequency
        ),
    )
}

/// Build a challenge body against a prior citation.
pub fn challenge(cited_event_id: EventId, grounds: impl Into<String>) -> EventBody {
    EventBody::PrecedentChallenged(PrecedentChallengedBody {
        cited_event_id,
        grounds: grounds.into(),
    })
}
