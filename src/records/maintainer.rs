use std::collections::BTreeMap;

use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::database::tenant_scope::TenantScope;
use crate::records::estimator::estimate_set;
use crate::records::state::{best_candidate, decide, Candidate, Decision, RecordEvent, RecordState};
use crate::types::{SetInput, SetType};

/// Apply one event to an exercise whose row is already locked by the
/// caller, and return the resulting state.
pub async fn apply(
    scope: &mut TenantScope,
    exercise_id: i64,
    current: RecordState,
    event: RecordEvent,
) -> Result<RecordState, DatabaseError> {
    let next = match decide(&current, &event) {
        Decision::Keep => return Ok(current),
        Decision::Replace(next) => next,
        Decision::Recompute { exclude } => recompute(scope, exercise_id, exclude).await?,
    };

    if next != current {
        debug!(
            "Exercise {} record {:?} -> {:?} after {:?}",
            exercise_id, current, next, event
        );
        scope.write_record(exercise_id, &next).await?;
    }
    Ok(next)
}

/// Best value of an exercise over the tenant's stored working sets
pub async fn recompute(
    scope: &mut TenantScope,
    exercise_id: i64,
    exclude_workout: Option<i64>,
) -> Result<RecordState, DatabaseError> {
    let sets = scope.working_sets(exercise_id, exclude_workout).await?;
    let best = best_candidate(sets.iter().map(|s| s.candidate()));
    debug!(
        "Recomputed exercise {} over {} working sets: {:?}",
        exercise_id,
        sets.len(),
        best
    );
    Ok(best.into())
}

/// Best working-set candidate per exercise among a workout's own sets.
/// Exercises with only warmup sets map to `None`.
pub fn workout_bests<'a, I>(workout_id: i64, sets: I) -> BTreeMap<i64, Option<Candidate>>
where
    I: IntoIterator<Item = (i64, &'a SetInput)>,
{
    let mut bests: BTreeMap<i64, Option<Candidate>> = BTreeMap::new();
    for (exercise_id, set) in sets {
        let entry = bests.entry(exercise_id).or_insert(None);
        if set.set_type != SetType::Working {
            continue;
        }
        let candidate = Candidate {
            value: estimate_set(set.weight, set.reps),
            workout_id,
        };
        let current = *entry;
        *entry = best_candidate(current.into_iter().chain(std::iter::once(candidate)));
    }
    bests
}
