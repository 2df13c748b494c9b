//! Error classification for the engine: build-time range errors, serialization
//! errors, and the query-time terminal states that are not errors at all.

use crate::ids::{ConnectionId, StopId, TripId};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("connection arrival ({arrival}) must be after departure ({departure})")]
    NonPositiveDuration { departure: u32, arrival: u32 },

    #[error("connection duration {duration} exceeds the {max} second limit")]
    DurationOutOfRange { duration: u32, max: u32 },

    #[error("connection departure time {departure} exceeds the {max} second limit")]
    DepartureOutOfRange { departure: u32, max: u32 },

    #[error("stop link for stop {attempted} appended out of order (currently building stop {current:?})")]
    StopLinksOutOfOrder {
        current: Option<u32>,
        attempted: u32,
    },

    #[error("connections store has not been sorted; call sort() before enumerate()")]
    NotSorted,

    #[error("sort() requires a concrete ordering (ByDeparture or ByArrival), not Sorting::None")]
    NoSortTargetGiven,

    #[error("connection id {0} is out of range")]
    UnknownConnection(ConnectionId),

    #[error("stop id {0} is out of range")]
    UnknownStop(StopId),

    #[error("trip id {0} is out of range")]
    UnknownTrip(TripId),

    #[error("on-disk format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("serialized stream truncated while reading {0}")]
    Truncated(&'static str),

    #[error("road-network db guid mismatch: stop links index was built against a different db")]
    GuidMismatch,

    #[error("access-mode profile metric is not time-in-seconds")]
    NotATimeProfile,

    #[error("search was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
