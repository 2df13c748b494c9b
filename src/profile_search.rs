//! ProfileSearch (§4.5): the Connection Scan profile search. A single
//! forward sweep over [`ConnectionsStore`] connections sorted by
//! departure time, maintaining a Pareto front of (arrival-time,
//! transfer-count) entries per stop and a dense per-trip reached/boarded
//! table (§9 "trip-status bookkeeping").

use chrono::NaiveDate;

use crate::connections::{ConnectionsStore, Sorting};
use crate::error::{Error, Result};
use crate::ids::{ConnectionId, EntryId, StopId, Timestamp, TransferCount, TripId};
use crate::time::service_date;
use crate::transfers::TransfersStore;

/// One entry in a stop's Pareto front: reachable at `seconds` with
/// exactly `k` transfers (`k` is the entry's index in
/// [`StopProfile::entries`], not stored redundantly on the entry
/// itself). `id` is this entry's own stable handle into
/// [`ProfileSearch`]'s arena, assigned once at creation; `previous_entry_id`
/// references a predecessor the same way, rather than by `(stop, k)`. A
/// front-slot position can legitimately be overwritten later in the scan
/// by a strictly better entry (a later-departing, faster trip arriving
/// earlier), so anything that has already linked to a predecessor by its
/// `(stop, k)` position would silently follow that overwrite instead of
/// the value that existed at link time; linking by arena id avoids that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileEntry {
    pub id: EntryId,
    pub stop_id: StopId,
    pub seconds: Timestamp,
    pub previous_connection_id: Option<ConnectionId>,
    pub previous_entry_id: Option<EntryId>,
    pub is_transfer: bool,
}

/// A stop's Pareto front, indexed by transfer count. Entries are `None`
/// where no profile with that exact transfer count has been found; per
/// the dominance invariant (§4.5), the `Some` entries' `seconds` strictly
/// decrease as the index increases.
#[derive(Debug, Clone, Default)]
pub struct StopProfile {
    entries: Vec<Option<ProfileEntry>>,
}

impl StopProfile {
    pub fn entry(&self, k: usize) -> Option<&ProfileEntry> {
        self.entries.get(k).and_then(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    /// The best (lowest-`k`, hence fewest-transfer) entry whose `seconds`
    /// is `<= at_or_before`, along with its `k`. This is the "earliest
    /// profile at dep_stop with seconds <= t_dep" lookup from step 3 of
    /// the scan (§4.5); front entries are strictly decreasing in
    /// `seconds`, so the first entry satisfying the bound is also the
    /// fewest-transfer one satisfying it.
    pub fn best_at_or_before(&self, at_or_before: Timestamp) -> Option<(TransferCount, Timestamp)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(k, entry)| {
                let entry = entry.as_ref()?;
                (entry.seconds <= at_or_before).then_some((k as TransferCount, entry.seconds))
            })
    }

    /// Attempts to install `candidate` at index `k_new`. Accepts iff it
    /// strictly improves the existing entry at `k_new` (or there is none)
    /// and is not dominated by any entry at a lower `k`. On acceptance,
    /// truncates every later entry now dominated by the new one (§4.5
    /// step 8/9 "truncate all entries at k'' > k_new that are now
    /// dominated").
    fn propose(&mut self, k_new: TransferCount, candidate: ProfileEntry) -> bool {
        let k_new = k_new as usize;

        for k in 0..k_new {
            if let Some(existing) = self.entries.get(k).and_then(|e| e.as_ref()) {
                if existing.seconds <= candidate.seconds {
                    return false;
                }
            }
        }

        let improves = match self.entries.get(k_new).and_then(|e| e.as_ref()) {
            Some(existing) => candidate.seconds < existing.seconds,
            None => true,
        };
        if !improves {
            return false;
        }

        if self.entries.len() <= k_new {
            self.entries.resize(k_new + 1, None);
        }
        self.entries[k_new] = Some(candidate);

        let mut cut = k_new + 1;
        while cut < self.entries.len() {
            if let Some(later) = &self.entries[cut] {
                if later.seconds >= candidate.seconds {
                    self.entries[cut] = None;
                } else {
                    break;
                }
            }
            cut += 1;
        }
        true
    }
}

/// Per-trip reached/boarded bookkeeping (§3, §9 "trip-status
/// bookkeeping"). §3 also names `board_stop`/`board_time` on this
/// struct, but this crate's back-pointer scheme reconstructs a route
/// through the arena's `previous_entry_id` chain rather than by
/// replaying a trip's own boarding point (see Scenario C's two-hop
/// same-trip test, which walks back through the per-connection arena
/// entries, never through `TripStatus`) — carrying those two fields
/// here with nothing to read them back would just be dead weight.
#[derive(Debug, Clone, Copy)]
struct TripStatus {
    reached: bool,
    transfers_when_boarded: TransferCount,
}

impl Default for TripStatus {
    fn default() -> Self {
        Self {
            reached: false,
            transfers_when_boarded: TransferCount::MAX,
        }
    }
}

/// A target stop's final-leg walking offset, seeded by the caller after
/// running the backward [`crate::closest_stops::ClosestStopsSearch`]
/// (§4.5 `set_target_stop`).
#[derive(Debug, Clone, Copy)]
struct TargetStop {
    walking_time_to_target: Timestamp,
}

/// Result of a completed scan: whether any target was reached, the best
/// known arrival at the (virtual) target, and which stop/profile index
/// that arrival came from so [`crate::route_builder::RouteBuilder`] can
/// start walking back-pointers from there.
#[derive(Debug, Clone, Copy)]
pub struct ScanOutcome {
    pub has_succeeded: bool,
    pub best_target_arrival: Timestamp,
    pub best_target_stop: Option<StopId>,
    pub best_target_k: Option<TransferCount>,
}

/// Per-query scratch state plus the algorithm itself. One instance is
/// built fresh per query and discarded at query end (§3 "Lifecycles").
pub struct ProfileSearch<'a> {
    connections: &'a ConnectionsStore,
    transfers: Option<&'a TransfersStore>,
    departure_date: NaiveDate,
    trip_is_possible: &'a dyn Fn(TripId, NaiveDate) -> bool,

    profiles: Vec<StopProfile>,
    trip_status: Vec<TripStatus>,
    targets: Vec<Option<TargetStop>>,
    /// Every accepted [`ProfileEntry`], append-only and indexed by its own
    /// `id`. Front-slot overwrites in `profiles` never touch entries
    /// already pushed here, which is what keeps `previous_entry_id` links
    /// resolvable to the value they had at link time.
    arena: Vec<ProfileEntry>,

    best_target_arrival: Timestamp,
    best_target_stop: Option<StopId>,
    best_target_k: Option<TransferCount>,
}

impl<'a> ProfileSearch<'a> {
    pub fn new(
        connections: &'a ConnectionsStore,
        transfers: Option<&'a TransfersStore>,
        departure_date: NaiveDate,
        num_stops: usize,
        num_trips: usize,
        trip_is_possible: &'a dyn Fn(TripId, NaiveDate) -> bool,
    ) -> Self {
        Self {
            connections,
            transfers,
            departure_date,
            trip_is_possible,
            profiles: vec![StopProfile::default(); num_stops],
            trip_status: vec![TripStatus::default(); num_trips],
            targets: vec![None; num_stops],
            arena: Vec::new(),
            best_target_arrival: Timestamp::MAX,
            best_target_stop: None,
            best_target_k: None,
        }
    }

    /// Attempts to install `candidate` at `(stop_id, k_new)`, stamping it
    /// with a fresh arena id first. Returns that id iff the front accepted
    /// it, so callers can hand the id out as a `previous_entry_id` for
    /// whatever gets proposed downstream.
    fn accept(&mut self, stop_id: StopId, k_new: TransferCount, mut candidate: ProfileEntry) -> Option<EntryId> {
        let id = self.arena.len() as EntryId;
        candidate.id = id;
        candidate.stop_id = stop_id;
        if self.profiles[stop_id as usize].propose(k_new, candidate) {
            self.arena.push(candidate);
            Some(id)
        } else {
            None
        }
    }

    /// Looks up a previously accepted entry by its stable arena id. Unlike
    /// `profile(stop).entry(k)`, this is immune to later front-slot
    /// overwrites at that same `(stop, k)` position.
    pub fn entry_by_id(&self, id: EntryId) -> &ProfileEntry {
        &self.arena[id as usize]
    }

    /// Seeds `stop_id`'s k=0 profile entry with the time the caller's
    /// forward access search reached it (§4.5 `set_source_stop`).
    pub fn set_source_stop(&mut self, stop_id: StopId, earliest_time_seconds: Timestamp) {
        self.accept(
            stop_id,
            0,
            ProfileEntry {
                id: 0,
                stop_id: 0,
                seconds: earliest_time_seconds,
                previous_connection_id: None,
                previous_entry_id: None,
                is_transfer: false,
            },
        );
    }

    /// Records `stop_id` as a registered target with the final walking
    /// leg to the actual geographic target (§4.5 `set_target_stop`).
    pub fn set_target_stop(&mut self, stop_id: StopId, walking_time_to_target: Timestamp) {
        self.targets[stop_id as usize] = Some(TargetStop {
            walking_time_to_target,
        });
    }

    pub fn profile(&self, stop_id: StopId) -> &StopProfile {
        &self.profiles[stop_id as usize]
    }

    /// Runs the scan to completion (or until cancelled / the deadline
    /// gate fires). `cancelled` is checked at the top of every iteration
    /// (§5 "Cancellation"); a cancelled scan returns `Err(Error::Cancelled)`
    /// rather than a partial [`ScanOutcome`], matching the "no observable
    /// partial results" contract.
    pub fn run(&mut self, mut cancelled: impl FnMut() -> bool) -> Result<ScanOutcome> {
        let mut scan = self.connections.enumerate(Sorting::ByDeparture)?;
        let mut scanned = 0u64;

        while let Some(c) = scan.move_next() {
            if cancelled() {
                log::debug!("profile scan cancelled after {scanned} connections");
                return Err(Error::Cancelled);
            }
            scanned += 1;

            // 1. Schedule gate.
            let dep_date = service_date(self.departure_date, c.departure_time);
            if !(self.trip_is_possible)(c.trip, dep_date) {
                continue;
            }

            // 2. Deadline gate: nothing departing this late or later can
            // still beat the best known target arrival.
            if c.departure_time >= self.best_target_arrival {
                break;
            }

            // 3. Reachability by foot from source, via the front at dep_stop.
            let by_source = self.profiles[c.departure_stop as usize]
                .best_at_or_before(c.departure_time)
                .map(|(k, _)| k);
            let by_source_entry_id = by_source.and_then(|k| {
                self.profiles[c.departure_stop as usize]
                    .entry(k as usize)
                    .map(|e| e.id)
            });

            // 4. Reachability by continuing the same trip.
            let status = self.trip_status[c.trip as usize];
            let by_trip = status.reached.then_some(status.transfers_when_boarded);

            let k_new = match (by_source, by_trip) {
                (None, None) => continue, // 5. neither gate produced a boarding
                (Some(k), None) => k + 1,
                (None, Some(k_trip)) => k_trip,
                (Some(k), Some(k_trip)) => k_trip.min(k + 1),
            };

            // 7. Update trip status if this is a first reach or an improvement.
            let is_new_board = !status.reached || k_new < status.transfers_when_boarded;
            if is_new_board {
                self.trip_status[c.trip as usize] = TripStatus {
                    reached: true,
                    transfers_when_boarded: k_new,
                };
            }

            // 8. Relax to arr_stop.
            let accepted_id = self.accept(
                c.arrival_stop,
                k_new,
                ProfileEntry {
                    id: 0,
                    stop_id: 0,
                    seconds: c.arrival_time(),
                    previous_connection_id: Some(c.id),
                    previous_entry_id: by_source_entry_id,
                    is_transfer: false,
                },
            );

            if let Some(entry_id) = accepted_id {
                // 9. Propagate footpath transfers from arr_stop.
                if let Some(transfers) = self.transfers {
                    let arrival = c.arrival_time();
                    let k_transfer = k_new + 1;
                    for (neighbor, walk_seconds) in transfers.neighbors(c.arrival_stop) {
                        self.accept(
                            neighbor,
                            k_transfer,
                            ProfileEntry {
                                id: 0,
                                stop_id: 0,
                                seconds: arrival + walk_seconds,
                                previous_connection_id: None,
                                previous_entry_id: Some(entry_id),
                                is_transfer: true,
                            },
                        );
                    }
                }

                // 10. Target update.
                if let Some(target) = self.targets[c.arrival_stop as usize] {
                    let candidate = c.arrival_time() + target.walking_time_to_target;
                    if candidate < self.best_target_arrival {
                        self.best_target_arrival = candidate;
                        self.best_target_stop = Some(c.arrival_stop);
                        self.best_target_k = Some(k_new);
                    }
                }
            }
        }

        let has_succeeded = self.best_target_stop.is_some();
        if has_succeeded {
            log::info!(
                "profile scan reached target stop {:?} at {} after scanning {scanned} connections",
                self.best_target_stop, self.best_target_arrival
            );
        } else {
            log::info!("profile scan found no route after scanning {scanned} connections");
        }

        Ok(ScanOutcome {
            has_succeeded,
            best_target_arrival: self.best_target_arrival,
            best_target_stop: self.best_target_stop,
            best_target_k: self.best_target_k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionsStore;

    fn always_possible(_: TripId, _: NaiveDate) -> bool {
        true
    }

    fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()
    }

    // Scenario A — one-hop success.
    #[test]
    fn scenario_a_one_hop_success() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 3600, 6000).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 2, 1, &always);
        search.set_source_stop(0, 3000);
        search.set_target_stop(1, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);
        assert_eq!(outcome.best_target_arrival, 6000);

        let profile = search.profile(1);
        let entry = profile.entry(1).expect("k=1 entry");
        assert_eq!(entry.seconds, 6000);
    }

    // Scenario B — one-hop miss.
    #[test]
    fn scenario_b_one_hop_miss() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 3600, 6000).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 2, 1, &always);
        search.set_source_stop(0, 30600);
        search.set_target_stop(1, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(!outcome.has_succeeded);
    }

    // Scenario C — two-hop same trip.
    #[test]
    fn scenario_c_two_hop_same_trip() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 28800, 29400).unwrap();
        store.add(1, 2, 0, 29460, 30000).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 3, 1, &always);
        search.set_source_stop(0, 27000);
        search.set_target_stop(2, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);
        assert_eq!(outcome.best_target_arrival, 30000);

        // Staying on trip 0 must not have consumed a second transfer slot.
        assert_eq!(outcome.best_target_k, Some(1));
    }

    // Scenario D — two-hop with a trip change.
    #[test]
    fn scenario_d_two_hop_with_transfer_at_shared_stop() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 28800, 29400).unwrap();
        store.add(1, 2, 1, 29700, 30300).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 3, 2, &always);
        search.set_source_stop(0, 27000);
        search.set_target_stop(2, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);
        assert_eq!(outcome.best_target_arrival, 30300);
        assert_eq!(outcome.best_target_k, Some(2));
    }

    // Scenario E — direct connection dominates the two-hop alternative at
    // the same arrival time because it has fewer transfers.
    #[test]
    fn scenario_e_direct_connection_dominates() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 28800, 29400).unwrap();
        store.add(1, 2, 1, 29700, 30300).unwrap();
        store.add(0, 2, 2, 28860, 30300).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 3, 3, &always);
        search.set_source_stop(0, 27000);
        search.set_target_stop(2, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);
        assert_eq!(outcome.best_target_arrival, 30300);
        assert_eq!(outcome.best_target_k, Some(1));

        // After sort(ByDeparture) ids follow departure order: c1 (0->1)=0,
        // the direct c3 (0->2, dep 28860)=1, c2 (1->2, dep 29700)=2.
        let profile = search.profile(2);
        let winning = profile.entry(1).expect("k=1 entry");
        assert_eq!(winning.previous_connection_id, Some(1));
        assert!(profile.entry(2).is_none());
    }

    // Scenario F — a footpath transfer links two otherwise disconnected trips.
    #[test]
    fn scenario_f_footpath_transfer() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 28800, 29400).unwrap();
        store.add(2, 3, 1, 29700, 30300).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let mut transfers = TransfersStore::new();
        transfers.add(1, 2, 100);

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, Some(&transfers), base_date(), 4, 2, &always);
        search.set_source_stop(0, 27000);
        search.set_target_stop(3, 0);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);
        assert_eq!(outcome.best_target_arrival, 30300);

        let stop_2_profile = search.profile(2);
        let transfer_entry = stop_2_profile.entry(2).expect("transfer entry at k=2");
        assert!(transfer_entry.is_transfer);
        assert_eq!(transfer_entry.seconds, 29500);
    }

    #[test]
    fn cancellation_short_circuits_with_no_partial_result() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 3600, 6000).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let mut search = ProfileSearch::new(&store, None, base_date(), 2, 1, &always);
        search.set_source_stop(0, 3000);
        search.set_target_stop(1, 0);

        let result = search.run(|| true);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn profile_dominance_rejects_worse_or_equal_entries() {
        let mut profile = StopProfile::default();
        let base = ProfileEntry {
            id: 0,
            stop_id: 0,
            seconds: 1000,
            previous_connection_id: None,
            previous_entry_id: None,
            is_transfer: false,
        };
        assert!(profile.propose(0, base));
        // A later, equal-or-worse entry at a higher k is dominated.
        assert!(!profile.propose(1, ProfileEntry { seconds: 1000, ..base }));
        assert!(!profile.propose(1, ProfileEntry { seconds: 1500, ..base }));
        // A strictly better entry at a higher k is accepted.
        assert!(profile.propose(1, ProfileEntry { seconds: 900, ..base }));
    }
}
