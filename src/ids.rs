//! Narrow integer aliases for the identifiers that flow through the engine.
//!
//! These stay plain type aliases rather than newtypes: cheap to copy,
//! cheap to pack into columnar arrays, and the thing that's actually
//! load-bearing (density, range) is documented at the call site.

pub type StopId = u32;
pub type TripId = u32;
pub type ConnectionId = u32;
pub type EdgeId = u32;

/// A stable identifier for one accepted [`crate::profile_search::ProfileEntry`],
/// assigned once at creation and never reused. Back-pointers reference an
/// entry by this id rather than by its `(stop, k)` front-slot position, since
/// that position can be overwritten by a later, better entry while earlier
/// downstream entries still need to resolve their predecessor's original
/// value.
pub type EntryId = u32;

/// Seconds since local midnight. May exceed 86_400 to express an overnight
/// trip still anchored to the service day it started on.
pub type Timestamp = u32;

/// A transfer count / Pareto-front index. Small by construction (nobody
/// reasonably transfers more than a few dozen times before a deadline gate
/// or a domination check prunes the search).
pub type TransferCount = u16;
