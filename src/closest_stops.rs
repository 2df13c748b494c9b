//! ClosestStopsSearch (§4.4): a bounded road-network exploration from a
//! geographic point that reports transit stops within a time budget by
//! following [`StopLinksIndex`].

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::ids::StopId;
use crate::road_network::{BoundedDijkstra, EdgeProfileFn, RoadGraph, RouterPoint, SourcePath};
use crate::stop_links::StopLinksIndex;

/// The best-known way to reach one stop: total seconds plus the snap
/// point (edge/offset) that produced it, so [`ClosestStopsSearch::path_to`]
/// can hand back something a route can be concatenated onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopHit {
    pub stop_id: StopId,
    pub seconds: f32,
    pub point: RouterPoint,
}

/// Result of running a bounded access search from (or to, if `backward`)
/// one geographic point.
pub struct ClosestStopsSearch {
    backward: bool,
    source: RouterPoint,
    best: HashMap<StopId, StopHit>,
}

impl ClosestStopsSearch {
    /// Runs the search. `profile` must represent a time-in-seconds
    /// metric; callers whose access-mode profile isn't time-based are
    /// expected to reject construction before reaching here (§4.4, §7),
    /// but a non-finite/negative factor on the source edge itself is
    /// still rejected fast since it would otherwise corrupt every
    /// downstream computation.
    pub fn run<G: RoadGraph>(
        graph: &G,
        stop_links: &StopLinksIndex,
        source: RouterPoint,
        backward: bool,
        max_seconds: f32,
        profile: EdgeProfileFn,
        mut stop_found: impl FnMut(StopId, f32) -> bool,
    ) -> Result<Self> {
        let source_factor = profile(source.edge_id);
        if !source_factor.is_finite() || source_factor < 0.0 {
            log::error!(
                "access-mode profile factor for edge {} is not a time-in-seconds metric ({source_factor})",
                source.edge_id
            );
            return Err(Error::NotATimeProfile);
        }

        let mut search = ClosestStopsSearch {
            backward,
            source,
            best: HashMap::new(),
        };

        let length = graph.edge_length(source.edge_id);

        // Edge-on-source-edge special case (§4.4): stops sharing the
        // source's own edge are reachable with no intermediate vertex at
        // all, and must be reported before the Dijkstra frontier opens.
        let mut terminated_early = false;
        for (stop_id, offset) in stop_links.stops_on_edge(source.edge_id) {
            let on_path = if backward {
                offset <= source.offset
            } else {
                offset >= source.offset
            };
            if !on_path {
                continue;
            }
            let distance = (offset as f32 - source.offset as f32).abs();
            let seconds = source_factor * distance;
            if search.offer(stop_id, seconds, source.edge_id, offset, source.lat, source.lon)
                && stop_found(stop_id, seconds)
            {
                terminated_early = true;
                break;
            }
        }

        if terminated_early {
            return Ok(search);
        }

        let (start, end) = graph.edge_endpoints(source.edge_id);
        let source_paths = if backward {
            vec![SourcePath {
                vertex: start,
                weight: source_factor * source.offset as f32,
                edge: Some(source.edge_id),
            }]
        } else {
            vec![SourcePath {
                vertex: end,
                weight: source_factor * (length - source.offset as f32),
                edge: Some(source.edge_id),
            }]
        };

        let mut dijkstra = BoundedDijkstra::new(graph, profile, &source_paths, max_seconds, backward);
        let mut stop = false;
        dijkstra.run(|vertex, weight| {
            if stop {
                return true;
            }
            for (edge, _) in graph.edges_from(vertex, backward) {
                let factor = profile(edge);
                if !factor.is_finite() || factor < 0.0 {
                    continue;
                }
                let edge_len = graph.edge_length(edge);
                for (stop_id, offset) in stop_links.stops_on_edge(edge) {
                    let remaining = if backward {
                        factor * (edge_len - offset as f32)
                    } else {
                        factor * offset as f32
                    };
                    let seconds = weight + remaining;
                    if search.offer(stop_id, seconds, edge, offset, f32::NAN, f32::NAN)
                        && stop_found(stop_id, seconds)
                    {
                        stop = true;
                    }
                }
            }
            stop
        });

        Ok(search)
    }

    /// Records a candidate hit, keeping only the best-seen one per stop.
    /// Returns whether this candidate is (now) the best known for its
    /// stop, since only an improving hit should be offered to the
    /// caller's `StopFound` callback.
    fn offer(
        &mut self,
        stop_id: StopId,
        seconds: f32,
        edge_id: u32,
        offset: u16,
        lat: f32,
        lon: f32,
    ) -> bool {
        let improves = self
            .best
            .get(&stop_id)
            .map(|hit| seconds < hit.seconds)
            .unwrap_or(true);
        if improves {
            self.best.insert(
                stop_id,
                StopHit {
                    stop_id,
                    seconds,
                    point: RouterPoint {
                        edge_id,
                        offset,
                        lat,
                        lon,
                    },
                },
            );
        }
        improves
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn source(&self) -> RouterPoint {
        self.source
    }

    pub fn weight_to(&self, stop: StopId) -> Option<f32> {
        self.best.get(&stop).map(|hit| hit.seconds)
    }

    pub fn path_to(&self, stop: StopId) -> Option<StopHit> {
        self.best.get(&stop).copied()
    }

    pub fn target_point(&self, stop: StopId) -> Option<RouterPoint> {
        self.best.get(&stop).map(|hit| hit.point)
    }

    pub fn reached_stops(&self) -> impl Iterator<Item = &StopHit> {
        self.best.values()
    }
}
