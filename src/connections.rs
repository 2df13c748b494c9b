//! The columnar connections store (§3, §4.1): a packed array of
//! `(departure_stop, arrival_stop, trip, departure_time, duration)` tuples,
//! sortable by departure or arrival time, with O(1) lookup of the
//! alternate ordering via a secondary permutation.
//!
//! Storage mirrors the on-disk layout in §6 directly: four `u32` words per
//! connection, word 3 bit-packing `departure_time` (low 17 bits) and
//! `duration` (high 15 bits). Keeping the in-memory representation
//! byte-identical to the serialized one means `serialize`/`deserialize`
//! are a straight `memcpy`-shaped copy rather than a re-encode.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::ids::{ConnectionId, StopId, Timestamp, TripId};
use crate::serialize::{read_i64, read_u32, read_u8, write_i64, write_u32, write_u8};
use crate::time::{MAX_DEPARTURE_TIME, MAX_DURATION};

const FORMAT_VERSION: u8 = 1;
const WORDS_PER_CONNECTION: usize = 4;

/// Which end of a connection the store is currently sorted by.
///
/// Deserializing the on-disk byte `0` must map to `None`, not silently
/// collapse into `ByArrival` the way the reference decoder does (§9); the
/// three states below are matched explicitly at every boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sorting {
    None,
    ByDeparture,
    ByArrival,
}

impl Sorting {
    fn to_byte(self) -> u8 {
        match self {
            Sorting::None => 0,
            Sorting::ByDeparture => 1,
            Sorting::ByArrival => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Sorting> {
        match byte {
            0 => Some(Sorting::None),
            1 => Some(Sorting::ByDeparture),
            2 => Some(Sorting::ByArrival),
            _ => None,
        }
    }

    fn other(self) -> Sorting {
        match self {
            Sorting::ByDeparture => Sorting::ByArrival,
            Sorting::ByArrival => Sorting::ByDeparture,
            Sorting::None => Sorting::None,
        }
    }
}

/// A decoded view of one connection record. Returned by the enumerator and
/// usable standalone when inspecting a record fetched by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionView {
    pub departure_stop: StopId,
    pub arrival_stop: StopId,
    pub trip: TripId,
    pub departure_time: Timestamp,
    pub duration: u16,
    pub id: ConnectionId,
}

impl ConnectionView {
    pub fn arrival_time(&self) -> Timestamp {
        self.departure_time + self.duration as Timestamp
    }
}

fn pack_word3(departure_time: u32, duration: u32) -> u32 {
    departure_time | (duration << 17)
}

fn unpack_word3(word: u32) -> (u32, u32) {
    (word & 0x1_FFFF, word >> 17)
}

/// Columnar store of timetabled connections (§3, §4.1).
pub struct ConnectionsStore {
    /// `4 * len()` packed `u32` words, physically ordered by `sorting`.
    connections: Vec<u32>,
    /// Secondary ordering: `order_by_rank[rank]` is the id whose record
    /// appears at that rank under the non-primary sort key.
    order_by_rank: Vec<u32>,
    /// Inverse of `order_by_rank`, derived at sort time: `rank_by_id[id]`
    /// is the secondary rank of `id`. Not serialized (§6 only stores the
    /// forward permutation); rebuilt from it on load.
    rank_by_id: Vec<u32>,
    sorting: Sorting,
}

impl ConnectionsStore {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            order_by_rank: Vec::new(),
            rank_by_id: Vec::new(),
            sorting: Sorting::None,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len() / WORDS_PER_CONNECTION
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sorting(&self) -> Sorting {
        self.sorting
    }

    /// Appends a connection, returning its id. Ids are insertion-order
    /// indices until the next [`Self::sort`], after which `enumerate`
    /// reassigns ids to match the freshly-sorted physical layout (§3: "ids
    /// are dense from 0").
    ///
    /// Fails if `arrival <= departure`, if the duration would exceed 15
    /// bits, or if `departure` would exceed 17 bits (§3 invariants).
    pub fn add(
        &mut self,
        departure_stop: StopId,
        arrival_stop: StopId,
        trip: TripId,
        departure: Timestamp,
        arrival: Timestamp,
    ) -> Result<ConnectionId> {
        if arrival <= departure {
            log::error!("connection {departure_stop}->{arrival_stop} on trip {trip} has arrival {arrival} <= departure {departure}");
            return Err(Error::NonPositiveDuration {
                departure,
                arrival,
            });
        }
        let duration = arrival - departure;
        if duration > MAX_DURATION {
            log::error!("connection {departure_stop}->{arrival_stop} on trip {trip} has duration {duration} exceeding the {MAX_DURATION} second limit");
            return Err(Error::DurationOutOfRange {
                duration,
                max: MAX_DURATION,
            });
        }
        if departure > MAX_DEPARTURE_TIME {
            log::error!("connection {departure_stop}->{arrival_stop} on trip {trip} departs at {departure}, beyond the {MAX_DEPARTURE_TIME} second limit");
            return Err(Error::DepartureOutOfRange {
                departure,
                max: MAX_DEPARTURE_TIME,
            });
        }

        let id = self.len() as ConnectionId;
        self.connections.push(departure_stop);
        self.connections.push(arrival_stop);
        self.connections.push(trip);
        self.connections.push(pack_word3(departure, duration));

        // Any prior sort is invalidated by mutating the record set.
        self.sorting = Sorting::None;
        self.order_by_rank.clear();
        self.rank_by_id.clear();

        Ok(id)
    }

    fn decode_at(&self, physical_index: usize) -> ConnectionView {
        let base = physical_index * WORDS_PER_CONNECTION;
        let departure_stop = self.connections[base];
        let arrival_stop = self.connections[base + 1];
        let trip = self.connections[base + 2];
        let (departure_time, duration) = unpack_word3(self.connections[base + 3]);
        ConnectionView {
            departure_stop,
            arrival_stop,
            trip,
            departure_time,
            duration: duration as u16,
            id: physical_index as ConnectionId,
        }
    }

    /// Fetches a connection by its (post-sort) id in O(1).
    pub fn get(&self, id: ConnectionId) -> Result<ConnectionView> {
        if (id as usize) >= self.len() {
            return Err(Error::UnknownConnection(id));
        }
        Ok(self.decode_at(id as usize))
    }

    fn primary_key(view: &ConnectionView, primary: Sorting) -> (Timestamp, TripId) {
        let time = match primary {
            Sorting::ByDeparture => view.departure_time,
            Sorting::ByArrival => view.arrival_time(),
            Sorting::None => unreachable!("sort() is only called with a concrete ordering"),
        };
        (time, view.trip)
    }

    /// Sorts the store so that a forward enumerator walks connections in
    /// `primary` order (ties broken by trip id), and an alternate
    /// enumerator can walk the other ordering via the secondary
    /// permutation (§4.1, §9).
    ///
    /// Two independent sorts happen here: first the physical record array
    /// is permuted into primary order (so that post-sort ids equal
    /// physical position); then a plain `u32` identity array is sorted by
    /// the *other* key, indexing into the now-primary-sorted records (the
    /// "safe formulation" from §9, to sidestep the reference
    /// implementation's index/id mixups in its two sort call sites).
    ///
    /// Fails rather than panicking if asked to sort by `Sorting::None`
    /// (§7 "never silent"): the type allows a caller to pass it, so a
    /// release build must reject it the same way a debug build would.
    pub fn sort(&mut self, primary: Sorting) -> Result<()> {
        if primary == Sorting::None {
            log::warn!("sort() called with Sorting::None, which is not a concrete ordering");
            return Err(Error::NoSortTargetGiven);
        }

        let n = self.len();
        let mut records: Vec<ConnectionView> = (0..n).map(|i| self.decode_at(i)).collect();
        records.sort_unstable_by_key(|v| Self::primary_key(v, primary));

        // Physical position becomes the new id for every record, by
        // construction of the loop below.
        let mut packed = Vec::with_capacity(self.connections.len());
        for view in &records {
            packed.push(view.departure_stop);
            packed.push(view.arrival_stop);
            packed.push(view.trip);
            packed.push(pack_word3(view.departure_time, view.duration as u32));
        }
        self.connections = packed;

        // Re-decode against the new physical layout so `id == position`.
        let secondary = primary.other();
        let mut order_by_rank: Vec<u32> = (0..n as u32).collect();
        order_by_rank.sort_unstable_by_key(|&id| {
            let view = self.decode_at(id as usize);
            Self::primary_key(&view, secondary)
        });

        let mut rank_by_id = vec![0u32; n];
        for (rank, &id) in order_by_rank.iter().enumerate() {
            rank_by_id[id as usize] = rank as u32;
        }

        self.order_by_rank = order_by_rank;
        self.rank_by_id = rank_by_id;
        self.sorting = primary;
        log::info!("ConnectionsStore sorted {n} connections by {primary:?}");
        Ok(())
    }

    /// Returns an enumerator walking connections in `sort` order. Fails if
    /// the store has not been sorted at all (§4.1 failure semantics).
    pub fn enumerate(&self, sort: Sorting) -> Result<Enumerator<'_>> {
        if self.sorting == Sorting::None {
            log::warn!("enumerate({sort:?}) called on an unsorted ConnectionsStore");
            return Err(Error::NotSorted);
        }
        let is_primary = sort == self.sorting;
        Ok(Enumerator {
            store: self,
            is_primary,
            rank: None,
        })
    }

    /// Serializes using the §6 on-disk format.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        write_u8(w, FORMAT_VERSION)?;
        write_u8(w, self.sorting.to_byte())?;
        write_i64(w, self.len() as i64)?;
        for &word in &self.connections {
            write_u32(w, word)?;
        }
        for &word in &self.order_by_rank {
            write_u32(w, word)?;
        }
        Ok(())
    }

    /// Deserializes from the §6 on-disk format. Fails open on a version
    /// mismatch or a truncated stream (§7); never silently accepts
    /// corrupt data.
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let version = read_u8(r, "version")?;
        if version != FORMAT_VERSION {
            log::warn!("ConnectionsStore deserialize found version {version}, expected {FORMAT_VERSION}");
            return Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                found: version,
            });
        }
        let sorting_byte = read_u8(r, "sorting")?;
        let sorting = Sorting::from_byte(sorting_byte).ok_or(Error::Truncated("sorting byte"))?;
        let count = read_i64(r, "connection count")?;
        if count < 0 {
            return Err(Error::Truncated("connection count"));
        }
        let count = count as usize;

        let mut connections = Vec::with_capacity(count * WORDS_PER_CONNECTION);
        for _ in 0..(count * WORDS_PER_CONNECTION) {
            connections.push(read_u32(r, "connection word")?);
        }

        let mut order_by_rank = Vec::with_capacity(count);
        for _ in 0..count {
            order_by_rank.push(read_u32(r, "order permutation")?);
        }

        let mut rank_by_id = vec![0u32; count];
        for (rank, &id) in order_by_rank.iter().enumerate() {
            rank_by_id[id as usize] = rank as u32;
        }

        Ok(Self {
            connections,
            order_by_rank,
            rank_by_id,
            sorting,
        })
    }
}

impl Default for ConnectionsStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward or alternate-order cursor over a [`ConnectionsStore`].
///
/// `move_next`/`move_previous` advance in whichever order this enumerator
/// was asked for; `move_to(id)` seeks to a connection by id in O(1)
/// regardless of ordering, using `rank_by_id` for the secondary case
/// (§9: "the `MoveTo` formulation is correct").
pub struct Enumerator<'a> {
    store: &'a ConnectionsStore,
    is_primary: bool,
    rank: Option<usize>,
}

impl<'a> Enumerator<'a> {
    fn rank_to_id(&self, rank: usize) -> u32 {
        if self.is_primary {
            rank as u32
        } else {
            self.store.order_by_rank[rank]
        }
    }

    fn id_to_rank(&self, id: u32) -> usize {
        if self.is_primary {
            id as usize
        } else {
            self.store.rank_by_id[id as usize] as usize
        }
    }

    pub fn current(&self) -> Option<ConnectionView> {
        let rank = self.rank?;
        if rank >= self.store.len() {
            return None;
        }
        Some(self.store.decode_at(self.rank_to_id(rank) as usize))
    }

    pub fn move_next(&mut self) -> Option<ConnectionView> {
        let next_rank = match self.rank {
            None => 0,
            Some(r) => r + 1,
        };
        if next_rank >= self.store.len() {
            self.rank = Some(self.store.len());
            return None;
        }
        self.rank = Some(next_rank);
        self.current()
    }

    pub fn move_previous(&mut self) -> Option<ConnectionView> {
        let previous_rank = match self.rank {
            None | Some(0) => return None,
            Some(r) => r - 1,
        };
        self.rank = Some(previous_rank);
        self.current()
    }

    pub fn move_to(&mut self, id: ConnectionId) -> Option<ConnectionView> {
        if (id as usize) >= self.store.len() {
            return None;
        }
        self.rank = Some(self.id_to_rank(id));
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> ConnectionsStore {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 3600, 4000).unwrap();
        store.add(1, 2, 0, 4000, 4500).unwrap();
        store.add(0, 2, 1, 3500, 4600).unwrap();
        store
    }

    #[test]
    fn rejects_nonpositive_duration() {
        let mut store = ConnectionsStore::new();
        assert!(matches!(
            store.add(0, 1, 0, 100, 100),
            Err(Error::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn rejects_duration_over_limit() {
        let mut store = ConnectionsStore::new();
        assert!(matches!(
            store.add(0, 1, 0, 0, MAX_DURATION + 2),
            Err(Error::DurationOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_departure_over_limit() {
        let mut store = ConnectionsStore::new();
        assert!(matches!(
            store.add(0, 1, 0, MAX_DEPARTURE_TIME + 1, MAX_DEPARTURE_TIME + 100),
            Err(Error::DepartureOutOfRange { .. })
        ));
    }

    #[test]
    fn enumerate_without_sort_fails() {
        let store = sample_store();
        assert!(matches!(
            store.enumerate(Sorting::ByDeparture),
            Err(Error::NotSorted)
        ));
    }

    #[test]
    fn sort_rejects_none_as_a_target_ordering() {
        let mut store = sample_store();
        assert!(matches!(
            store.sort(Sorting::None),
            Err(Error::NoSortTargetGiven)
        ));
    }

    #[test]
    fn sorts_by_departure_then_alternate_by_arrival() {
        let mut store = sample_store();
        store.sort(Sorting::ByDeparture).unwrap();

        let mut forward = store.enumerate(Sorting::ByDeparture).unwrap();
        let mut seen = Vec::new();
        while let Some(c) = forward.move_next() {
            seen.push(c.departure_time);
        }
        assert_eq!(seen, vec![3500, 3600, 4000]);

        let mut alt = store.enumerate(Sorting::ByArrival).unwrap();
        let mut arrivals = Vec::new();
        while let Some(c) = alt.move_next() {
            arrivals.push(c.arrival_time());
        }
        let mut sorted_arrivals = arrivals.clone();
        sorted_arrivals.sort_unstable();
        assert_eq!(arrivals, sorted_arrivals);
    }

    #[test]
    fn move_to_is_order_independent() {
        let mut store = sample_store();
        store.sort(Sorting::ByDeparture).unwrap();

        let mut primary = store.enumerate(Sorting::ByDeparture).unwrap();
        let target = primary.move_next().unwrap();

        let mut secondary = store.enumerate(Sorting::ByArrival).unwrap();
        let found = secondary.move_to(target.id).unwrap();
        assert_eq!(found.id, target.id);
        assert_eq!(found.departure_time, target.departure_time);
    }

    #[test]
    fn round_trips_through_serialization() {
        let mut store = sample_store();
        store.sort(Sorting::ByDeparture).unwrap();

        let mut bytes = Vec::new();
        store.serialize(&mut bytes).unwrap();
        let restored = ConnectionsStore::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(restored.len(), store.len());
        assert_eq!(restored.sorting(), store.sorting());

        let mut a = store.enumerate(Sorting::ByDeparture).unwrap();
        let mut b = restored.enumerate(Sorting::ByDeparture).unwrap();
        loop {
            match (a.move_next(), b.move_next()) {
                (None, None) => break,
                (Some(x), Some(y)) => assert_eq!(x, y),
                other => panic!("enumerators diverged: {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_truncated_stream() {
        let mut store = sample_store();
        store.sort(Sorting::ByDeparture).unwrap();
        let mut bytes = Vec::new();
        store.serialize(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            ConnectionsStore::deserialize(&mut bytes.as_slice()),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut store = sample_store();
        store.sort(Sorting::ByDeparture).unwrap();
        let mut bytes = Vec::new();
        store.serialize(&mut bytes).unwrap();
        bytes[0] = 99;
        assert!(matches!(
            ConnectionsStore::deserialize(&mut bytes.as_slice()),
            Err(Error::VersionMismatch { .. })
        ));
    }
}
