//! StopLinks (§3, §4.2): a per-access-mode-profile index from a stop to
//! the road-network edge offsets it snaps to, stored as a compact
//! `(start, count)` pointer array over a flat `(edge_id, offset)` data
//! array. Append-only, grouped by ascending stop id, built with a single
//! forward pass over sorted input rather than a general
//! insert-anywhere structure.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::ids::{EdgeId, StopId};
use crate::serialize::{
    read_guid, read_i64, read_u32, read_u8, read_utf16_string, write_guid, write_i64, write_u32,
    write_u8, write_utf16_string,
};

const FORMAT_VERSION: u8 = 1;

/// One snap point: an edge and the offset (in the edge's own distance
/// units, typically meters-along-edge) along it where a stop sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLink {
    pub edge_id: EdgeId,
    pub offset: u16,
}

/// Builder / in-memory form of one access-mode profile's stop-links
/// index. `add` enforces the append-only-per-stop discipline from §4.2:
/// once stop `s` has been appended to, only further links for `s` (or a
/// later stop) may be added.
#[derive(Debug, Clone)]
pub struct StopLinksBuilder {
    /// `(start, count)` per stop, indexed by stop id. `pointers.len()`
    /// is the number of stops opened so far, so `pointers.len() - 1` is
    /// always the currently open stop once at least one exists.
    pointers: Vec<(u32, u32)>,
    data: Vec<(EdgeId, u16)>,
}

impl StopLinksBuilder {
    pub fn new() -> Self {
        Self {
            pointers: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Appends one link for `stop_id`. `stop_id` must be the currently
    /// open stop, or any stop at or after it — jumping ahead (e.g. from
    /// stop 3 straight to stop 5) opens every skipped stop in between
    /// with zero links, which is the normal case for a stop that simply
    /// has no links under this access-mode profile (§3 only requires
    /// stop ids to be dense, not that every stop has a link). Calling
    /// with a `stop_id` strictly before the currently open stop fails
    /// (§4.2).
    pub fn add(&mut self, stop_id: StopId, edge_id: EdgeId, offset: u16) -> Result<()> {
        let opened = self.pointers.len() as u32;
        if opened > 0 && stop_id < opened - 1 {
            let current = opened - 1;
            log::error!("stop links appended out of order: stop {stop_id} after stop {current} was already opened");
            return Err(Error::StopLinksOutOfOrder {
                current: Some(current),
                attempted: stop_id,
            });
        }
        if stop_id >= opened {
            self.open_stops_through(stop_id);
        }

        let start = self.pointers[stop_id as usize].0;
        debug_assert_eq!(start as usize + self.pointers[stop_id as usize].1 as usize, self.data.len());
        self.data.push((edge_id, offset));
        self.pointers[stop_id as usize].1 += 1;
        Ok(())
    }

    /// Opens every not-yet-opened stop from the current frontier through
    /// `stop_id` inclusive, each starting with zero links.
    fn open_stops_through(&mut self, stop_id: StopId) {
        while (self.pointers.len() as u32) <= stop_id {
            self.pointers.push((self.data.len() as u32, 0));
        }
    }

    pub fn build(self) -> StopLinksIndex {
        StopLinksIndex {
            pointers: self.pointers,
            data: self.data,
        }
    }
}

impl Default for StopLinksBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The finished, query-time stop-links index for one access-mode
/// profile.
#[derive(Debug, Clone, Default)]
pub struct StopLinksIndex {
    pointers: Vec<(u32, u32)>,
    data: Vec<(EdgeId, u16)>,
}

impl StopLinksIndex {
    pub fn num_stops(&self) -> usize {
        self.pointers.len()
    }

    /// O(1) seek, O(count) walk over the links recorded for `stop_id`.
    /// A stop with no links recorded at all (id beyond what was built)
    /// simply yields an empty iterator.
    pub fn enumerate(&self, stop_id: StopId) -> impl Iterator<Item = StopLink> + '_ {
        let entry = self.pointers.get(stop_id as usize).copied();
        let (start, count) = entry.unwrap_or((0, 0));
        self.data[start as usize..(start + count) as usize]
            .iter()
            .map(|&(edge_id, offset)| StopLink { edge_id, offset })
    }

    /// All stops with at least one link on `edge_id`, needed by
    /// [`crate::closest_stops::ClosestStopsSearch`] when it settles an
    /// edge and must find which stops sit on it.
    pub fn stops_on_edge(&self, edge_id: EdgeId) -> impl Iterator<Item = (StopId, u16)> + '_ {
        self.pointers
            .iter()
            .enumerate()
            .flat_map(move |(stop_idx, &(start, count))| {
                self.data[start as usize..(start + count) as usize]
                    .iter()
                    .filter(move |&&(e, _)| e == edge_id)
                    .map(move |&(_, offset)| (stop_idx as StopId, offset))
            })
    }
}

/// A read-only, disk-backed (or deserialized) StopLinks database for one
/// named access-mode profile, with the §6 guid invariant against the
/// road-network db it was built against.
#[derive(Debug, Clone)]
pub struct StopLinksDb {
    pub road_network_guid: [u8; 16],
    pub profile_name: String,
    pub index: StopLinksIndex,
}

impl StopLinksDb {
    pub fn new(road_network_guid: [u8; 16], profile_name: String, index: StopLinksIndex) -> Self {
        Self {
            road_network_guid,
            profile_name,
            index,
        }
    }

    /// Opens the db, checking its stored guid against the road network
    /// it's about to be paired with. Fails open (§7) on mismatch.
    pub fn open_against(&self, road_network_guid: [u8; 16]) -> Result<&Self> {
        if self.road_network_guid != road_network_guid {
            log::error!(
                "stop links db for profile {:?} was built against a different road network db",
                self.profile_name
            );
            return Err(Error::GuidMismatch);
        }
        Ok(self)
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        write_u8(w, FORMAT_VERSION)?;
        write_guid(w, &self.road_network_guid)?;
        write_utf16_string(w, &self.profile_name)?;

        let pointer_words = self.index.pointers.len() * 2;
        let data_words = self.index.data.len() * 2;
        write_i64(w, pointer_words as i64)?;
        write_i64(w, data_words as i64)?;

        for &(start, count) in &self.index.pointers {
            write_u32(w, start)?;
            write_u32(w, count)?;
        }
        for &(edge_id, offset) in &self.index.data {
            write_u32(w, edge_id)?;
            write_u32(w, offset as u32)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let version = read_u8(r, "version")?;
        if version != FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                found: version,
            });
        }
        let road_network_guid = read_guid(r)?;
        let profile_name = read_utf16_string(r)?;

        let pointer_words = read_i64(r, "pointer-array length")?;
        let data_words = read_i64(r, "data-array length")?;
        if pointer_words < 0 || data_words < 0 || pointer_words % 2 != 0 || data_words % 2 != 0 {
            return Err(Error::Truncated("stop links array length"));
        }

        let mut pointers = Vec::with_capacity((pointer_words / 2) as usize);
        for _ in 0..(pointer_words / 2) {
            let start = read_u32(r, "stop link pointer")?;
            let count = read_u32(r, "stop link pointer")?;
            pointers.push((start, count));
        }

        let mut data = Vec::with_capacity((data_words / 2) as usize);
        for _ in 0..(data_words / 2) {
            let edge_id = read_u32(r, "stop link data")?;
            let offset = read_u32(r, "stop link data")?;
            data.push((edge_id, offset as u16));
        }

        Ok(Self {
            road_network_guid,
            profile_name,
            index: StopLinksIndex { pointers, data },
        })
    }
}
