use chrono::{DateTime, Utc};

use crate::models::Slot;

/// Order slots by absolute distance to `target`, nearest first; ties break
/// chronologically. Stateless, used by the conversation layer when the
/// patient named a preferred date/time.
pub fn rank_by_proximity(mut slots: Vec<Slot>, target: DateTime<Utc>) -> Vec<Slot> {
    slots.sort_by(|a, b| {
        let da = (a.start_time - target).num_seconds().abs();
        let db = (b.start_time - target).num_seconds().abs();
        da.cmp(&db).then_with(|| a.start_time.cmp(&b.start_time))
    });
    slots
}
