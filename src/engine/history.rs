use thiserror::Error;

use crate::models::event::OfferEvent;
use crate::models::offer::OfferStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("event sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("event {sequence} starts from {found} but the offer was {expected}")]
    Discontinuity {
        sequence: u64,
        expected: OfferStatus,
        found: OfferStatus,
    },

    #[error("event {sequence} leaves {from} for {to}, which is not a legal transition")]
    IllegalTransition {
        sequence: u64,
        from: OfferStatus,
        to: OfferStatus,
    },
}

/// Folds an offer's events, in sequence order, into the status they imply.
pub fn replay(events: &[OfferEvent]) -> Result<OfferStatus, ReplayError> {
    let mut ordered: Vec<&OfferEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.sequence);

    let mut status = OfferStatus::NewOfferCaptured;

    for (index, event) in ordered.into_iter().enumerate() {
        let expected = index as u64 + 1;
        if event.sequence != expected {
            return Err(ReplayError::SequenceGap {
                expected,
                found: event.sequence,
            });
        }

        let payload = &event.payload;
        if payload.from_state != status {
            return Err(ReplayError::Discontinuity {
                sequence: event.sequence,
                expected: status,
                found: payload.from_state,
            });
        }
        if !payload.from_state.can_transition_to(payload.to_state) {
            return Err(ReplayError::IllegalTransition {
                sequence: event.sequence,
                from: payload.from_state,
                to: payload.to_state,
            });
        }

        status = payload.to_state;
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    use super::{replay, ReplayError};
    use crate::models::event::{OfferEvent, OfferEventType, TransitionPayload};
    use crate::models::offer::OfferStatus::{self, *};

    fn event(sequence: u64, from: OfferStatus, to: OfferStatus) -> OfferEvent {
        OfferEvent {
            id: Uuid::new_v4(),
            offer_id: Uuid::nil(),
            sequence,
            event_type: OfferEventType::StateChange,
            payload: TransitionPayload {
                from_state: from,
                to_state: to,
                extra: Map::new(),
            },
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn booking_history_replays_to_booked() {
        let events = vec![
            event(3, OfferSent, Booked),
            event(1, NewOfferCaptured, RoutingToCandidates),
            event(2, RoutingToCandidates, OfferSent),
        ];

        assert_eq!(replay(&events), Ok(Booked));
    }

    #[test]
    fn lost_event_is_detected() {
        let events = vec![
            event(1, NewOfferCaptured, RoutingToCandidates),
            event(2, OfferSent, Negotiating),
        ];

        assert_eq!(
            replay(&events),
            Err(ReplayError::Discontinuity {
                sequence: 2,
                expected: RoutingToCandidates,
                found: OfferSent,
            })
        );
    }

    #[test]
    fn sequence_gap_is_reported() {
        let events = vec![
            event(1, NewOfferCaptured, RoutingToCandidates),
            event(3, RoutingToCandidates, OfferSent),
        ];

        assert!(matches!(replay(&events), Err(ReplayError::SequenceGap { expected: 2, found: 3 })));
    }

    #[test]
    fn nothing_leaves_booked() {
        let events = vec![
            event(1, NewOfferCaptured, RoutingToCandidates),
            event(2, RoutingToCandidates, OfferSent),
            event(3, OfferSent, Booked),
            event(4, Booked, Negotiating),
        ];

        assert!(matches!(replay(&events), Err(ReplayError::IllegalTransition { .. })));
    }

    #[test]
    fn empty_history_is_a_fresh_offer() {
        assert_eq!(replay(&[]), Ok(NewOfferCaptured));
    }
}
