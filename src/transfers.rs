//! TransfersStore (§3, §4.3): a sparse, symmetric stop-to-stop walking
//! time map used to propagate a stop's profile update to its
//! walk-reachable neighbors.

use hashbrown::HashMap;

use crate::ids::StopId;

/// Symmetric sparse map `(stop_a, stop_b) -> seconds`. Only pairs within
/// `max_transfer_seconds` are ever added (§3); the store itself does not
/// enforce that bound, it's a build-time policy of the caller deciding
/// which pairs to add.
#[derive(Debug, Clone, Default)]
pub struct TransfersStore {
    neighbors: HashMap<StopId, Vec<(StopId, u32)>>,
}

impl TransfersStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transfer both ways. Adding the same pair twice with
    /// different durations keeps both entries; `neighbors` returns
    /// whatever was added, in insertion order, and callers that want a
    /// single walk time per pair are expected not to double-add.
    pub fn add(&mut self, a: StopId, b: StopId, seconds: u32) {
        self.neighbors.entry(a).or_default().push((b, seconds));
        if a != b {
            self.neighbors.entry(b).or_default().push((a, seconds));
        }
    }

    pub fn neighbors(&self, stop: StopId) -> impl Iterator<Item = (StopId, u32)> + '_ {
        self.neighbors
            .get(&stop)
            .into_iter()
            .flat_map(|v| v.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.neighbors.values().map(|v| v.len()).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
