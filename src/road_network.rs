//! The road-network boundary (§1, §6): this module only defines the
//! *contract* `ClosestStopsSearch` drives — the router's own graph
//! construction, restriction handling, and vehicle-profile modeling are
//! out of scope (§1 "external collaborators"). What's here is:
//!
//! - a minimal [`RoadGraph`] trait describing the edge-relaxation shape
//!   the search needs,
//! - [`RouterPoint`], a snap onto an edge,
//! - the `Dijkstra` step/was_found/try_get_visit contract from §6, and
//! - [`BoundedDijkstra`], a reference implementation of that contract
//!   (grounded in the same `BinaryHeap` + reverse-ordered min-heap
//!   wrapper idiom used for bounded road search elsewhere in this
//!   corpus) so the rest of the engine has something concrete to drive
//!   in tests, without pretending to be a production OSM router.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::ids::EdgeId;

pub type VertexId = u32;

/// A point pinned to a specific offset along a specific edge, the same
/// shape a transit stop snaps to in [`crate::stop_links`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterPoint {
    pub edge_id: EdgeId,
    pub offset: u16,
    pub lat: f32,
    pub lon: f32,
}

/// Opaque vehicle-profile speed factor: a function from edge to a
/// seconds-per-unit-distance factor (the inverse of a travel speed),
/// consumed without ever being interpreted. An edge's total traversal
/// weight is this factor times
/// [`RoadGraph::edge_length`]; a partial traversal of `d` distance units
/// costs `factor * d`, which is what makes the offset interpolation in
/// [`crate::closest_stops`] a plain multiplication rather than a ratio.
pub type EdgeProfileFn<'a> = &'a dyn Fn(EdgeId) -> f32;

/// The minimal view of a road network [`BoundedDijkstra`] needs. A real
/// router's graph (with restrictions, turn costs, multiple profiles)
/// implements this; the engine never constructs one itself.
pub trait RoadGraph {
    /// Edges leaving `vertex` when searching forward, or edges entering
    /// `vertex` when searching backward (the caller picks which set to
    /// hand back based on `backward`, matching the "edge_or_null" source
    /// path shape from the §6 contract).
    fn edges_from(&self, vertex: VertexId, backward: bool) -> Vec<(EdgeId, VertexId)>;

    fn edge_endpoints(&self, edge: EdgeId) -> (VertexId, VertexId);

    /// Length of `edge` in the same distance units `StopLink::offset` is
    /// expressed in.
    fn edge_length(&self, edge: EdgeId) -> f32;
}

/// One source the bounded search starts from: a vertex already reached
/// with `weight` seconds of cost, optionally via `edge` (the edge whose
/// relaxation produced this source, `None` for a bare vertex seed).
#[derive(Debug, Clone, Copy)]
pub struct SourcePath {
    pub vertex: VertexId,
    pub weight: f32,
    pub edge: Option<EdgeId>,
}

/// Reverse-ordered wrapper so `BinaryHeap` (a max-heap) pops the
/// smallest weight first.
struct MinScored<K>(f32, K);

impl<K: PartialEq> PartialEq for MinScored<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K: PartialEq> Eq for MinScored<K> {}

impl<K: PartialEq> PartialOrd for MinScored<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialEq> Ord for MinScored<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .partial_cmp(&self.0)
            .unwrap_or(Ordering::Equal)
    }
}

/// The `Dijkstra(...)` contract from §6: a step-driven, bounded
/// edge-relaxation search. `step()` relaxes one more vertex off the
/// frontier and returns whether there was one to relax; the driving
/// loop calls it until exhaustion or until `was_found` reports a stop of
/// interest.
pub struct BoundedDijkstra<'a, G: RoadGraph> {
    graph: &'a G,
    profile: EdgeProfileFn<'a>,
    max_weight: f32,
    backward: bool,
    frontier: BinaryHeap<MinScored<VertexId>>,
    best: HashMap<VertexId, (f32, Option<EdgeId>)>,
    settled: HashMap<VertexId, (f32, Option<EdgeId>)>,
}

impl<'a, G: RoadGraph> BoundedDijkstra<'a, G> {
    pub fn new(
        graph: &'a G,
        profile: EdgeProfileFn<'a>,
        source_paths: &[SourcePath],
        max_weight: f32,
        backward: bool,
    ) -> Self {
        let mut frontier = BinaryHeap::new();
        let mut best = HashMap::new();
        for source in source_paths {
            let entry = best.entry(source.vertex).or_insert((f32::INFINITY, None));
            if source.weight < entry.0 {
                *entry = (source.weight, source.edge);
                frontier.push(MinScored(source.weight, source.vertex));
            }
        }
        Self {
            graph,
            profile,
            max_weight,
            backward,
            frontier,
            best,
            settled: HashMap::new(),
        }
    }

    /// Relaxes the next frontier vertex, if any remains within budget.
    /// Returns the vertex just settled and its weight, or `None` once the
    /// frontier is empty or the next candidate would exceed `max_weight`
    /// (the search is considered exhausted at that point).
    pub fn step(&mut self) -> Option<(VertexId, f32)> {
        loop {
            let MinScored(weight, vertex) = self.frontier.pop()?;
            if weight > self.max_weight {
                return None;
            }
            if let Some(&(known, _)) = self.settled.get(&vertex) {
                if known <= weight {
                    continue;
                }
            }
            let via = self.best.get(&vertex).copied().unwrap_or((weight, None)).1;
            self.settled.insert(vertex, (weight, via));

            for (edge, to) in self.graph.edges_from(vertex, self.backward) {
                let factor = (self.profile)(edge);
                if !factor.is_finite() || factor < 0.0 {
                    continue;
                }
                let edge_weight = factor * self.graph.edge_length(edge);
                let candidate = weight + edge_weight;
                if candidate > self.max_weight {
                    continue;
                }
                let better = self
                    .best
                    .get(&to)
                    .map(|&(known, _)| candidate < known)
                    .unwrap_or(true);
                if better {
                    self.best.insert(to, (candidate, Some(edge)));
                    self.frontier.push(MinScored(candidate, to));
                }
            }
            return Some((vertex, weight));
        }
    }

    /// Drains the frontier, invoking `on_settle` for each vertex as it's
    /// settled, stopping early if `on_settle` returns `true` (the
    /// `StopFound`-terminates-the-search pattern from §4.4).
    pub fn run(&mut self, mut on_settle: impl FnMut(VertexId, f32) -> bool) {
        while let Some((vertex, weight)) = self.step() {
            if on_settle(vertex, weight) {
                break;
            }
        }
    }

    pub fn was_found(&self, vertex: VertexId) -> Option<f32> {
        self.settled.get(&vertex).map(|&(weight, _)| weight)
    }

    pub fn try_get_visit(&self, vertex: VertexId) -> Option<(f32, Option<EdgeId>)> {
        self.settled
            .get(&vertex)
            .copied()
            .or_else(|| self.best.get(&vertex).copied())
    }
}
