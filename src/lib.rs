//! Core data structures and algorithms for a multimodal journey-planning
//! engine: a columnar connections store, a stop-links index onto a road
//! network, and the Connection Scan profile search that ties the two
//! together into Pareto-optimal (arrival-time, transfer-count)
//! itineraries.
//!
//! This crate is the CORE only. GTFS/feed ingestion, the road-network
//! router itself, and anything CLI- or HTTP-facing live outside it; see
//! [`road_network`] for the boundary this crate expects a real router to
//! satisfy.

pub mod closest_stops;
pub mod connections;
pub mod error;
pub mod ids;
pub mod profile_search;
pub mod road_network;
pub mod route_builder;
pub mod serialize;
pub mod stop_links;
pub mod stops;
pub mod time;
pub mod transfers;

pub use closest_stops::{ClosestStopsSearch, StopHit};
pub use connections::{ConnectionView, ConnectionsStore, Enumerator, Sorting};
pub use error::{Error, Result};
pub use ids::{EdgeId, EntryId, StopId, Timestamp, TransferCount, TripId};
pub use profile_search::{ProfileEntry, ProfileSearch, ScanOutcome, StopProfile};
pub use road_network::{BoundedDijkstra, EdgeProfileFn, RoadGraph, RouterPoint, SourcePath, VertexId};
pub use route_builder::{Itinerary, Leg, RouteBuilder};
pub use stop_links::{StopLink, StopLinksBuilder, StopLinksDb, StopLinksIndex};
pub use stops::{approx_distance_meters, StopRecord, StopTable, TripRecord, TripTable};
pub use transfers::TransfersStore;
