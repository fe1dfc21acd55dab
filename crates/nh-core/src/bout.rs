//! Active bout detection.
//!
//! A bout is a maximal run of events in which no two consecutive events are
//! further apart than the inactivity threshold. Summing the spans of all
//! bouts gives the time someone was actively working on a skeleton.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::source::Event;
use crate::types::InactivityThreshold;

/// A run of events without an inactivity gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Bout<'a> {
    pub events: Vec<Event<'a>>,
    pub min_time: DateTime<Utc>,
    pub max_time: DateTime<Utc>,
}

impl<'a> Bout<'a> {
    fn start(event: Event<'a>) -> Self {
        Self {
            events: vec![event],
            min_time: event.timestamp,
            max_time: event.timestamp,
        }
    }

    fn push(&mut self, event: Event<'a>) {
        self.min_time = self.min_time.min(event.timestamp);
        self.max_time = self.max_time.max(event.timestamp);
        self.events.push(event);
    }

    /// Span from first to last event. Zero for a single-event bout.
    pub fn duration(&self) -> TimeDelta {
        self.max_time - self.min_time
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Splits an ordered event sequence into active bouts.
///
/// Consecutive events at most `threshold` apart share a bout. Input is
/// expected in chronological order (either direction); bouts come out in
/// the same order as their events.
pub fn active_bouts<'a>(events: &[Event<'a>], threshold: InactivityThreshold) -> Vec<Bout<'a>> {
    let max_gap = threshold.as_duration();
    let mut bouts: Vec<Bout<'a>> = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;

    for event in events {
        match (bouts.last_mut(), previous) {
            (Some(bout), Some(prev)) if (event.timestamp - prev).abs() <= max_gap => {
                bout.push(*event);
            }
            _ => bouts.push(Bout::start(*event)),
        }
        previous = Some(event.timestamp);
    }

    tracing::trace!(
        events = events.len(),
        bouts = bouts.len(),
        threshold_minutes = threshold.minutes(),
        "detected active bouts"
    );
    bouts
}

/// Sum of all bout spans.
pub fn total_time(bouts: &[Bout<'_>]) -> TimeDelta {
    bouts.iter().map(Bout::duration).sum()
}

/// A period of inactivity between two bouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Gap {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Inactivity gaps between consecutive bouts, in bout order.
pub fn inactivity_gaps(bouts: &[Bout<'_>]) -> Vec<Gap> {
    bouts
        .windows(2)
        .map(|pair| {
            let (before, after) = (&pair[0], &pair[1]);
            if before.max_time <= after.min_time {
                Gap {
                    start: before.max_time,
                    end: after.min_time,
                }
            } else {
                Gap {
                    start: after.max_time,
                    end: before.min_time,
                }
            }
        })
        .collect()
}
