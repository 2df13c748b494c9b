//! Synthetic example/benchmark fixtures for `conscan`. Feed parsing is
//! out of scope for this crate, so rather than loading a real GTFS feed
//! and road network, this generates a small deterministic grid road
//! network and a single-line transit timetable on top of it.

use chrono::NaiveDate;

use conscan::{
    ConnectionsStore, EdgeId, RoadGraph, RouterPoint, Sorting, StopId, StopLinksBuilder,
    StopLinksIndex, TransfersStore, VertexId,
};

/// Vertices laid out on a `width x height` grid, connected to their
/// immediate neighbours by unit-length edges in both directions.
pub struct GridGraph {
    width: u32,
    edges: Vec<(VertexId, VertexId, f32)>,
}

impl GridGraph {
    pub fn new(width: u32, height: u32) -> Self {
        let mut edges = Vec::new();
        let vertex = |x: u32, y: u32| y * width + x;
        for y in 0..height {
            for x in 0..width {
                let v = vertex(x, y);
                if x + 1 < width {
                    let right = vertex(x + 1, y);
                    edges.push((v, right, 1.0));
                    edges.push((right, v, 1.0));
                }
                if y + 1 < height {
                    let down = vertex(x, y + 1);
                    edges.push((v, down, 1.0));
                    edges.push((down, v, 1.0));
                }
            }
        }
        Self { width, edges }
    }

    pub fn vertex_at(&self, x: u32, y: u32) -> VertexId {
        y * self.width + x
    }
}

impl RoadGraph for GridGraph {
    fn edges_from(&self, vertex: VertexId, backward: bool) -> Vec<(EdgeId, VertexId)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(id, &(from, to, _))| {
                if !backward && from == vertex {
                    Some((id as EdgeId, to))
                } else if backward && to == vertex {
                    Some((id as EdgeId, from))
                } else {
                    None
                }
            })
            .collect()
    }

    fn edge_endpoints(&self, edge: EdgeId) -> (VertexId, VertexId) {
        let (from, to, _) = self.edges[edge as usize];
        (from, to)
    }

    fn edge_length(&self, edge: EdgeId) -> f32 {
        self.edges[edge as usize].2
    }
}

/// A generated benchmark scenario: a grid road network with a handful of
/// transit stops snapped onto it, served by one line running many trips
/// across the service day, plus footpath transfers between nearby stops.
pub struct ExampleScenario {
    pub graph: GridGraph,
    pub stop_links: StopLinksIndex,
    pub connections: ConnectionsStore,
    pub transfers: TransfersStore,
    pub num_stops: usize,
    pub num_trips: usize,
    pub source_point: RouterPoint,
    pub target_point: RouterPoint,
}

const NUM_LINE_STOPS: u32 = 30;
const GRID_WIDTH: u32 = NUM_LINE_STOPS + 4;
const GRID_HEIGHT: u32 = 8;
const FIRST_DEPARTURE: u32 = 5 * 3600;
const LAST_DEPARTURE: u32 = 23 * 3600;
const HEADWAY: u32 = 10 * 60;
const HOP_DURATION: u32 = 90;
const DWELL: u32 = 20;

/// The pedestrian access-mode factor used throughout the example: one
/// second per unit of edge length, i.e. a flat 1 unit/sec walking speed.
pub fn pedestrian_profile(_edge: EdgeId) -> f32 {
    1.0
}

/// Builds the grid road network plus stop links for a line of
/// [`NUM_LINE_STOPS`] stops, one per vertex along row 0, snapped at the
/// start of the edge leading to the next stop. `GRID_WIDTH` is kept
/// larger than the line so every stop has a genuine "next" edge.
fn build_road_and_links(graph: &GridGraph) -> (StopLinksIndex, Vec<EdgeId>) {
    let mut builder = StopLinksBuilder::new();
    let mut stop_edges = Vec::with_capacity(NUM_LINE_STOPS as usize);

    for stop_id in 0..NUM_LINE_STOPS {
        let from = graph.vertex_at(stop_id, 0);
        let to = graph.vertex_at(stop_id + 1, 0);
        let edge_id = graph
            .edges
            .iter()
            .position(|&(a, b, _)| a == from && b == to)
            .expect("row-0 edge exists for every line stop") as EdgeId;
        builder.add(stop_id as StopId, edge_id, 0).expect("ascending stop order");
        stop_edges.push(edge_id);
    }

    (builder.build(), stop_edges)
}

/// Lays down one line's worth of connections, one trip per departure
/// slot between [`FIRST_DEPARTURE`] and [`LAST_DEPARTURE`] every
/// [`HEADWAY`] seconds, each trip visiting every stop in order.
fn build_connections() -> (ConnectionsStore, usize) {
    let mut store = ConnectionsStore::new();
    let mut trip_id = 0u32;
    let mut departure = FIRST_DEPARTURE;

    while departure <= LAST_DEPARTURE {
        let mut t = departure;
        for stop in 0..(NUM_LINE_STOPS - 1) {
            let arrival = t + HOP_DURATION;
            store
                .add(stop as StopId, (stop + 1) as StopId, trip_id, t, arrival)
                .expect("synthetic connection within range");
            t = arrival + DWELL;
        }
        trip_id += 1;
        departure += HEADWAY;
    }

    store.sort(Sorting::ByDeparture).expect("non-empty synthetic timetable");
    (store, trip_id as usize)
}

/// Adds a short footpath transfer between every third pair of adjacent
/// stops, giving the profile search something to propagate besides
/// straight trip continuations.
fn build_transfers() -> TransfersStore {
    let mut transfers = TransfersStore::new();
    for stop in (0..NUM_LINE_STOPS - 1).step_by(3) {
        transfers.add(stop as StopId, (stop + 1) as StopId, 90);
    }
    transfers
}

pub fn build_example_scenario() -> ExampleScenario {
    let graph = GridGraph::new(GRID_WIDTH, GRID_HEIGHT);
    let (stop_links, stop_edges) = build_road_and_links(&graph);
    let (connections, num_trips) = build_connections();
    let transfers = build_transfers();

    let source_point = RouterPoint {
        edge_id: stop_edges[0],
        offset: 0,
        lat: 0.0,
        lon: 0.0,
    };
    let target_point = RouterPoint {
        edge_id: stop_edges[(NUM_LINE_STOPS - 1) as usize],
        offset: 0,
        lat: 0.0,
        lon: 0.0,
    };

    ExampleScenario {
        graph,
        stop_links,
        connections,
        transfers,
        num_stops: NUM_LINE_STOPS as usize,
        num_trips,
        source_point,
        target_point,
    }
}

pub fn get_example_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 28).expect("valid calendar date")
}

pub fn get_example_departure_time() -> u32 {
    FIRST_DEPARTURE + HEADWAY / 2
}

pub fn get_example_access_budget_seconds() -> f32 {
    600.0
}
