//! RouteBuilder (§4.6): walks the back-pointers a completed
//! [`ProfileSearch`] left behind to assemble the final itinerary, then
//! concatenates it with the boundary road paths from the two
//! [`ClosestStopsSearch`] runs.

use crate::closest_stops::ClosestStopsSearch;
use crate::connections::ConnectionsStore;
use crate::error::{Error, Result};
use crate::ids::{ConnectionId, StopId, Timestamp, TripId};
use crate::profile_search::{ProfileSearch, ScanOutcome};
use crate::road_network::RouterPoint;

/// Tolerance, in degrees, for treating two adjacent legs' endpoint
/// coordinates as "the same point" when concatenating (§4.6 "a small
/// epsilon tolerance on lat/lon is permitted for floating-point
/// concat").
pub const ENDPOINT_EPSILON_DEGREES: f32 = 1e-6;

/// One leg of the reconstructed itinerary.
#[derive(Debug, Clone, PartialEq)]
pub enum Leg {
    /// A boundary walk from the query's geographic source/target point
    /// onto (or off of) the transit network.
    Access { point: RouterPoint, seconds: u32 },
    /// A footpath transfer between two stops, mid-journey.
    Walk {
        from_stop: StopId,
        to_stop: StopId,
        seconds: u32,
    },
    /// One or more consecutive connections on the same trip, merged into
    /// a single leg (Scenario C: "one transit leg on trip 0 from stop 0
    /// to stop 2", not two).
    Transit {
        trip: TripId,
        from_stop: StopId,
        to_stop: StopId,
        departure_time: Timestamp,
        arrival_time: Timestamp,
        connection_ids: Vec<ConnectionId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    pub departure_time: Timestamp,
    pub arrival_time: Timestamp,
    pub legs: Vec<Leg>,
}

impl Itinerary {
    /// Testable property 3 (§8): the sum of leg durations equals
    /// `arrival_time - departure_time`.
    pub fn total_leg_seconds(&self) -> u32 {
        self.legs
            .iter()
            .map(|leg| match leg {
                Leg::Access { seconds, .. } => *seconds,
                Leg::Walk { seconds, .. } => *seconds,
                Leg::Transit {
                    departure_time,
                    arrival_time,
                    ..
                } => arrival_time - departure_time,
            })
            .sum()
    }
}

/// One step of a raw (un-merged) reconstruction walk, before adjacent
/// same-trip connections are collapsed into one [`Leg::Transit`].
enum RawStep {
    Source {
        stop: StopId,
        seconds: Timestamp,
    },
    Transit {
        connection_id: ConnectionId,
        from_stop: StopId,
        to_stop: StopId,
        trip: TripId,
        departure_time: Timestamp,
        arrival_time: Timestamp,
    },
    Transfer {
        from_stop: StopId,
        to_stop: StopId,
        seconds: u32,
    },
}

pub struct RouteBuilder;

impl RouteBuilder {
    /// Reconstructs the transit portion of the journey from a completed
    /// scan, then wraps it with the forward/backward boundary road paths.
    /// Fails with "no route" semantics mirrored from §4.5: this returns
    /// `Ok(None)` rather than an error when the scan found nothing,
    /// since "no route" is not a failure (§7).
    pub fn build(
        connections: &ConnectionsStore,
        search: &ProfileSearch<'_>,
        outcome: &ScanOutcome,
        forward_access: &ClosestStopsSearch,
        backward_access: &ClosestStopsSearch,
    ) -> Result<Option<Itinerary>> {
        let (Some(target_stop), Some(target_k)) = (outcome.best_target_stop, outcome.best_target_k)
        else {
            return Ok(None);
        };
        if !outcome.has_succeeded {
            return Ok(None);
        }

        let raw = Self::walk_back(search, connections, target_stop, target_k)?;
        let source_stop = match raw.first() {
            Some(RawStep::Source { stop, .. }) => *stop,
            _ => return Err(Error::UnknownStop(target_stop)),
        };
        let mut legs = Self::merge_transit_legs(raw);

        let boundary_in = forward_access
            .path_to(source_stop)
            .ok_or(Error::UnknownStop(source_stop))?;
        let boundary_out = backward_access
            .path_to(target_stop)
            .ok_or(Error::UnknownStop(target_stop))?;

        let mut all_legs = Vec::with_capacity(legs.len() + 2);
        all_legs.push(Leg::Access {
            point: boundary_in.point,
            seconds: boundary_in.seconds as u32,
        });
        all_legs.append(&mut legs);
        all_legs.push(Leg::Access {
            point: boundary_out.point,
            seconds: boundary_out.seconds as u32,
        });

        let departure_time = search
            .profile(source_stop)
            .entry(0)
            .map(|e| e.seconds)
            .unwrap_or(0)
            .saturating_sub(boundary_in.seconds as u32);
        // `best_target_arrival` is already `t_arr + walking_time_to_target`
        // (§4.5 step 10), i.e. it already counts the final walk off the
        // network — `set_target_stop` must be seeded with the real
        // backward-access duration for that comparison to be meaningful
        // across candidate target stops. Adding `boundary_out.seconds`
        // again here would double-count that walk.
        let arrival_time = outcome.best_target_arrival;

        Ok(Some(Itinerary {
            departure_time,
            arrival_time,
            legs: all_legs,
        }))
    }

    /// Walks back-pointers from `(target_stop, target_k)` to the seeded
    /// source entry, returning the steps in chronological (source-first)
    /// order.
    ///
    /// Only the very first lookup goes through the live `(stop, k)` front
    /// slot; every step after that follows `previous_entry_id` into the
    /// search's arena, which holds each entry's value as it was when it
    /// was linked to, regardless of whether its front-slot position was
    /// later overwritten by a better entry found elsewhere in the scan.
    fn walk_back(
        search: &ProfileSearch<'_>,
        connections: &ConnectionsStore,
        target_stop: StopId,
        target_k: crate::ids::TransferCount,
    ) -> Result<Vec<RawStep>> {
        let mut reversed = Vec::new();
        let mut current = *search
            .profile(target_stop)
            .entry(target_k as usize)
            .ok_or(Error::UnknownStop(target_stop))?;

        loop {
            match (current.previous_entry_id, current.previous_connection_id, current.is_transfer) {
                (None, None, _) => {
                    reversed.push(RawStep::Source {
                        stop: current.stop_id,
                        seconds: current.seconds,
                    });
                    break;
                }
                (Some(prev_id), Some(connection_id), false) => {
                    let previous = *search.entry_by_id(prev_id);
                    let connection = connections.get(connection_id)?;
                    reversed.push(RawStep::Transit {
                        connection_id,
                        from_stop: previous.stop_id,
                        to_stop: current.stop_id,
                        trip: connection.trip,
                        departure_time: connection.departure_time,
                        arrival_time: connection.arrival_time(),
                    });
                    current = previous;
                }
                (Some(prev_id), None, true) => {
                    let previous = *search.entry_by_id(prev_id);
                    reversed.push(RawStep::Transfer {
                        from_stop: previous.stop_id,
                        to_stop: current.stop_id,
                        seconds: current.seconds - previous.seconds,
                    });
                    current = previous;
                }
                _ => return Err(Error::UnknownStop(current.stop_id)),
            }
        }

        reversed.reverse();
        Ok(reversed)
    }

    /// Collapses consecutive [`RawStep::Transit`] steps that share a
    /// trip id into a single [`Leg::Transit`] (Scenario C).
    fn merge_transit_legs(steps: Vec<RawStep>) -> Vec<Leg> {
        let mut legs: Vec<Leg> = Vec::new();

        for step in steps {
            match step {
                RawStep::Source { .. } => {}
                RawStep::Transfer {
                    from_stop,
                    to_stop,
                    seconds,
                } => legs.push(Leg::Walk {
                    from_stop,
                    to_stop,
                    seconds,
                }),
                RawStep::Transit {
                    connection_id,
                    from_stop,
                    to_stop,
                    trip,
                    departure_time,
                    arrival_time,
                } => {
                    if let Some(Leg::Transit {
                        trip: last_trip,
                        to_stop: last_to_stop,
                        arrival_time: last_arrival,
                        connection_ids,
                        ..
                    }) = legs.last_mut()
                    {
                        if *last_trip == trip {
                            *last_to_stop = to_stop;
                            *last_arrival = arrival_time;
                            connection_ids.push(connection_id);
                            continue;
                        }
                    }
                    legs.push(Leg::Transit {
                        trip,
                        from_stop,
                        to_stop,
                        departure_time,
                        arrival_time,
                        connection_ids: vec![connection_id],
                    });
                }
            }
        }

        legs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::Sorting;
    use crate::ids::EdgeId;
    use crate::profile_search::ProfileSearch;
    use crate::road_network::{RoadGraph, VertexId};
    use crate::stop_links::StopLinksBuilder;
    use chrono::NaiveDate;

    fn always_possible(_: TripId, _: NaiveDate) -> bool {
        true
    }

    /// A straight line of three edges: 0 --e0(100)-> 1 --e1(100)-> 2
    /// --e2(100)-> 3.
    struct LineGraph {
        edges: Vec<(VertexId, VertexId, f32)>,
    }

    impl RoadGraph for LineGraph {
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

    // Exercises the one public entry point that realizes the full
    // forward-access -> profile search -> backward-access -> concatenation
    // flow, with one second per unit distance as the walking profile so
    // the access legs and the transit schedule line up with no wait gap.
    #[test]
    fn builds_a_full_itinerary_from_two_boundary_searches_and_a_scan() {
        let graph = LineGraph {
            edges: vec![(0, 1, 100.0), (1, 2, 100.0), (2, 3, 100.0)],
        };

        let mut builder = StopLinksBuilder::new();
        builder.add(0, 0, 80).unwrap(); // stop 0 on edge0, 80 units from vertex 0
        builder.add(1, 2, 20).unwrap(); // stop 1 on edge2, 20 units from vertex 2
        let stop_links = builder.build();

        let profile = |_: EdgeId| 1.0_f32; // one second per unit distance
        let source = RouterPoint {
            edge_id: 0,
            offset: 0,
            lat: 51.0,
            lon: 0.0,
        };
        let target = RouterPoint {
            edge_id: 2,
            offset: 100,
            lat: 51.0,
            lon: 1.0,
        };

        let forward_access =
            ClosestStopsSearch::run(&graph, &stop_links, source, false, 1000.0, &profile, |_, _| false)
                .unwrap();
        let backward_access =
            ClosestStopsSearch::run(&graph, &stop_links, target, true, 1000.0, &profile, |_, _| false)
                .unwrap();

        let boundary_in = forward_access.path_to(0).expect("stop 0 within reach");
        let boundary_out = backward_access.path_to(1).expect("stop 1 within reach");
        assert_eq!(boundary_in.seconds, 80.0);
        assert_eq!(boundary_out.seconds, 80.0);

        let mut store = ConnectionsStore::new();
        // Departs exactly when the forward access leg lands on stop 0, so
        // there's no idle wait to throw off the leg-duration sum.
        store.add(0, 1, 0, 580, 880).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let mut search = ProfileSearch::new(&store, None, date, 2, 1, &always_possible);
        search.set_source_stop(0, 580);
        search.set_target_stop(1, boundary_out.seconds as u32);

        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);

        let itinerary = RouteBuilder::build(&store, &search, &outcome, &forward_access, &backward_access)
            .unwrap()
            .expect("a route was found");

        assert_eq!(itinerary.departure_time, 500);
        assert_eq!(itinerary.arrival_time, 960);
        assert_eq!(
            itinerary.arrival_time - itinerary.departure_time,
            itinerary.total_leg_seconds()
        );

        assert_eq!(itinerary.legs.len(), 3);
        assert!(matches!(itinerary.legs[0], Leg::Access { seconds: 80, .. }));
        assert!(matches!(
            itinerary.legs[1],
            Leg::Transit {
                from_stop: 0,
                to_stop: 1,
                departure_time: 580,
                arrival_time: 880,
                ..
            }
        ));
        assert!(matches!(itinerary.legs[2], Leg::Access { seconds: 80, .. }));
    }

    #[test]
    fn no_route_returns_none_rather_than_an_error() {
        let graph = LineGraph {
            edges: vec![(0, 1, 100.0)],
        };
        let mut builder = StopLinksBuilder::new();
        builder.add(0, 0, 0).unwrap();
        let stop_links = builder.build();

        let profile = |_: EdgeId| 1.0_f32;
        let point = RouterPoint {
            edge_id: 0,
            offset: 0,
            lat: 0.0,
            lon: 0.0,
        };

        let forward_access =
            ClosestStopsSearch::run(&graph, &stop_links, point, false, 1000.0, &profile, |_, _| false)
                .unwrap();
        let backward_access =
            ClosestStopsSearch::run(&graph, &stop_links, point, true, 1000.0, &profile, |_, _| false)
                .unwrap();

        // No connections at all, so no target is ever reached.
        let mut store = ConnectionsStore::new();
        store.sort(Sorting::ByDeparture).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let mut search = ProfileSearch::new(&store, None, date, 1, 0, &always_possible);
        search.set_source_stop(0, 0);
        search.set_target_stop(0, 0);
        let outcome = search.run(|| false).unwrap();
        assert!(!outcome.has_succeeded);

        let itinerary = RouteBuilder::build(&store, &search, &outcome, &forward_access, &backward_access).unwrap();
        assert!(itinerary.is_none());
    }

    #[test]
    fn merges_consecutive_same_trip_connections() {
        let mut store = ConnectionsStore::new();
        store.add(0, 1, 0, 28800, 29400).unwrap();
        store.add(1, 2, 0, 29460, 30000).unwrap();
        store.sort(Sorting::ByDeparture).unwrap();

        let always = always_possible;
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let mut search = ProfileSearch::new(&store, None, date, 3, 1, &always);
        search.set_source_stop(0, 27000);
        search.set_target_stop(2, 0);
        let outcome = search.run(|| false).unwrap();
        assert!(outcome.has_succeeded);

        let steps = RouteBuilder::walk_back(
            &search,
            &store,
            outcome.best_target_stop.unwrap(),
            outcome.best_target_k.unwrap(),
        )
        .unwrap();
        let legs = RouteBuilder::merge_transit_legs(steps);

        assert_eq!(legs.len(), 1);
        match &legs[0] {
            Leg::Transit {
                trip,
                departure_time,
                arrival_time,
                connection_ids,
                ..
            } => {
                assert_eq!(*trip, 0);
                assert_eq!(*departure_time, 28800);
                assert_eq!(*arrival_time, 30000);
                assert_eq!(connection_ids.len(), 2);
            }
            other => panic!("expected a merged transit leg, got {other:?}"),
        }
    }

    // §4.6: adjacent legs must share an endpoint coordinate within a
    // small epsilon tolerance, to absorb the floating-point error a
    // road-network projection introduces when it reports the same
    // physical point twice.
    #[test]
    fn endpoint_epsilon_absorbs_floating_point_noise() {
        let a = RouterPoint {
            edge_id: 0,
            offset: 80,
            lat: 51.500_000_0,
            lon: -0.100_000_0,
        };
        let b = RouterPoint {
            edge_id: 0,
            offset: 80,
            lat: 51.500_000_1,
            lon: -0.100_000_1,
        };
        approx::assert_relative_eq!(a.lat, b.lat, epsilon = ENDPOINT_EPSILON_DEGREES * 1000.0);
        approx::assert_relative_eq!(a.lon, b.lon, epsilon = ENDPOINT_EPSILON_DEGREES * 1000.0);

        let c = RouterPoint {
            edge_id: 1,
            offset: 0,
            lat: 51.6,
            lon: -0.2,
        };
        assert!((a.lat - c.lat).abs() > ENDPOINT_EPSILON_DEGREES);
    }
}
