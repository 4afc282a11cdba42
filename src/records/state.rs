//! Per-exercise best-value cache as an explicit state machine.
//!
//! Every decision about whether a mutation can be absorbed with an O(1)
//! comparison or needs a rescan of the tenant's history is made by
//! [`decide`], which touches no storage.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::records::estimator::estimate_set;

/// Cached best value of one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RecordState {
    Empty,
    /// `source` is the workout credited with the value, or `None` when the
    /// value was pinned by hand.
    Cached { value: Decimal, source: Option<i64> },
}

impl RecordState {
    pub fn from_columns(value: Option<Decimal>, source: Option<i64>) -> Self {
        match value {
            Some(value) => RecordState::Cached { value, source },
            None => RecordState::Empty,
        }
    }

    /// Column values `(best_value, best_value_source_workout_id)`
    pub fn columns(&self) -> (Option<Decimal>, Option<i64>) {
        match *self {
            RecordState::Empty => (None, None),
            RecordState::Cached { value, source } => (Some(value), source),
        }
    }

    pub fn source(&self) -> Option<i64> {
        match *self {
            RecordState::Empty => None,
            RecordState::Cached { source, .. } => source,
        }
    }

    pub fn is_held_by(&self, workout_id: i64) -> bool {
        self.source() == Some(workout_id)
    }
}

impl From<Option<Candidate>> for RecordState {
    fn from(best: Option<Candidate>) -> Self {
        match best {
            Some(c) => RecordState::Cached {
                value: c.value,
                source: Some(c.workout_id),
            },
            None => RecordState::Empty,
        }
    }
}

/// A value some workout achieves for an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub value: Decimal,
    pub workout_id: i64,
}

impl Candidate {
    /// Equal values go to the lowest workout id, the earliest created.
    /// A pinned value has no workout to compare against, so only a strictly
    /// greater value displaces it.
    pub fn beats(&self, value: Decimal, source: Option<i64>) -> bool {
        match self.value.cmp(&value) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => source.is_some_and(|s| self.workout_id < s),
        }
    }
}

/// Highest candidate, ties broken toward the lowest workout id
pub fn best_candidate<I>(candidates: I) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if !c.beats(b.value, Some(b.workout_id)) => Some(b),
        _ => Some(c),
    })
}

/// One working set as read from storage, reduced to what the estimate needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct WorkingSet {
    pub workout_id: i64,
    pub weight: Option<i32>,
    pub reps: i32,
}

impl WorkingSet {
    pub fn candidate(&self) -> Candidate {
        Candidate {
            value: estimate_set(self.weight, self.reps),
            workout_id: self.workout_id,
        }
    }
}

/// What happened to an exercise's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    /// A new workout was saved; `best` is its best working set for the
    /// exercise, if it has one.
    Created { workout_id: i64, best: Option<Candidate> },
    /// A workout's sets were replaced; `best` is computed from the new sets.
    Updated { workout_id: i64, best: Option<Candidate> },
    Deleted { workout_id: i64 },
    Pinned(Option<Decimal>),
    RecomputeRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Replace(RecordState),
    /// Rescan the tenant's working sets, ignoring `exclude`.
    Recompute { exclude: Option<i64> },
}

pub fn decide(state: &RecordState, event: &RecordEvent) -> Decision {
    match *event {
        RecordEvent::Created { best, .. } => improve(state, best),
        RecordEvent::Updated { workout_id, best } => {
            if state.is_held_by(workout_id) {
                Decision::Recompute { exclude: None }
            } else {
                improve(state, best)
            }
        }
        RecordEvent::Deleted { workout_id } => {
            if state.is_held_by(workout_id) {
                Decision::Recompute { exclude: Some(workout_id) }
            } else {
                Decision::Keep
            }
        }
        RecordEvent::Pinned(value) => {
            let pinned = RecordState::from_columns(value, None);
            if pinned == *state {
                Decision::Keep
            } else {
                Decision::Replace(pinned)
            }
        }
        RecordEvent::RecomputeRequested => Decision::Recompute { exclude: None },
    }
}

fn improve(state: &RecordState, best: Option<Candidate>) -> Decision {
    let Some(candidate) = best else {
        return Decision::Keep;
    };
    match *state {
        RecordState::Empty => Decision::Replace(Some(candidate).into()),
        RecordState::Cached { value, source } if candidate.beats(value, source) => {
            Decision::Replace(Some(candidate).into())
        }
        RecordState::Cached { .. } => Decision::Keep,
    }
}
