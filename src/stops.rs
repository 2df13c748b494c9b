//! The stop and trip tables (§3): dense, immutable-after-build parallel
//! arrays, indexed by dense ids rather than owning references.

use crate::error::{Error, Result};
use crate::ids::StopId;

/// A single stop: geographic coordinates plus an opaque `meta_id` the
/// caller can use to join back to whatever external stop catalogue
/// (GTFS `stop_id`, a database row, ...) produced it. The engine itself
/// never interprets `meta_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRecord {
    pub lat: f32,
    pub lon: f32,
    pub meta_id: u32,
}

/// Dense, append-only table of [`StopRecord`]s. Stop ids are assigned in
/// insertion order and are dense from 0 (§3 invariant); there is no
/// removal operation, matching the "immutable during query time" stop
/// lifecycle.
#[derive(Debug, Clone, Default)]
pub struct StopTable {
    lat: Vec<f32>,
    lon: Vec<f32>,
    meta_id: Vec<u32>,
}

impl StopTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    pub fn add(&mut self, lat: f32, lon: f32, meta_id: u32) -> StopId {
        let id = self.lat.len() as StopId;
        self.lat.push(lat);
        self.lon.push(lon);
        self.meta_id.push(meta_id);
        id
    }

    pub fn get(&self, id: StopId) -> Result<StopRecord> {
        let i = id as usize;
        if i >= self.lat.len() {
            return Err(Error::UnknownStop(id));
        }
        Ok(StopRecord {
            lat: self.lat[i],
            lon: self.lon[i],
            meta_id: self.meta_id[i],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (StopId, StopRecord)> + '_ {
        (0..self.len()).map(move |i| {
            (
                i as StopId,
                StopRecord {
                    lat: self.lat[i],
                    lon: self.lon[i],
                    meta_id: self.meta_id[i],
                },
            )
        })
    }
}

/// Equirectangular approximation of the distance in meters between two
/// stops, adequate for the short hops StopLinks deals with at the scale
/// of a single transit system.
pub fn approx_distance_meters(a: StopRecord, b: StopRecord) -> f32 {
    const EARTH_RADIUS_M: f32 = 6_371_000.0;
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let mean_lat = (lat1 + lat2) / 2.0;
    let dx = (b.lon - a.lon).to_radians() * mean_lat.cos();
    let dy = (b.lat - a.lat).to_radians();
    EARTH_RADIUS_M * (dx * dx + dy * dy).sqrt()
}

/// A trip id referencing `(schedule_id, agency_meta_id, trip_meta_id)`
/// (§3). The engine only ever dereferences a trip id through
/// [`TripTable`] and the caller-supplied `trip_is_possible` schedule
/// predicate; it never inspects `agency_meta_id`/`trip_meta_id` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripRecord {
    pub schedule_id: u32,
    pub agency_meta_id: u32,
    pub trip_meta_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TripTable {
    records: Vec<TripRecord>,
}

impl TripTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add(&mut self, schedule_id: u32, agency_meta_id: u32, trip_meta_id: u32) -> u32 {
        let id = self.records.len() as u32;
        self.records.push(TripRecord {
            schedule_id,
            agency_meta_id,
            trip_meta_id,
        });
        id
    }

    pub fn get(&self, id: u32) -> Result<TripRecord> {
        self.records
            .get(id as usize)
            .copied()
            .ok_or(Error::UnknownTrip(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_ids_are_dense_from_zero() {
        let mut table = StopTable::new();
        let a = table.add(51.5, -0.1, 100);
        let b = table.add(51.6, -0.2, 101);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_stop_is_an_error() {
        let table = StopTable::new();
        assert!(matches!(table.get(0), Err(Error::UnknownStop(0))));
    }

    #[test]
    fn distance_is_symmetric_and_zero_at_same_point() {
        let a = StopRecord {
            lat: 51.5,
            lon: -0.1,
            meta_id: 0,
        };
        let b = StopRecord {
            lat: 51.51,
            lon: -0.09,
            meta_id: 0,
        };
        assert_eq!(approx_distance_meters(a, a), 0.0);
        assert!((approx_distance_meters(a, b) - approx_distance_meters(b, a)).abs() < 1e-3);
        assert!(approx_distance_meters(a, b) > 0.0);
    }
}
