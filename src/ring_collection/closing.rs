use super::RingCollection;
use crate::location::NodeId;
use crate::output::{ErrorCategory, OutputSink};
use geo::LineString;

/// A possible bridge from the last node of one open ring to the first node
/// of another (or the same) open ring.
#[derive(Debug, Clone, Copy)]
struct Connection {
    distance: f64,
    end_id: NodeId,
    start_id: NodeId,
}

impl Connection {
    fn shares_endpoint(&self, other: &Connection) -> bool {
        self.end_id == other.end_id || self.start_id == other.start_id
    }
}

impl RingCollection {
    /// Closes open rings across gaps shorter than `max_distance`, nearest
    /// gaps first.
    ///
    /// Each endpoint is used at most once. This is a greedy matching, not an
    /// optimal one: a long gap can stay open because both of its endpoints
    /// were consumed by shorter ones.
    pub fn close_rings(&mut self, output: &mut dyn OutputSink, max_distance: f64) {
        let max_distance_squared = max_distance * max_distance;
        let mut connections: Vec<Connection> = Vec::new();

        for (&end_id, &end_key) in &self.end_nodes {
            let Some(end_location) = self.rings.get(end_key).and_then(|r| r.last_location()) else {
                continue;
            };
            for (&start_id, &start_key) in &self.start_nodes {
                let Some(distance) = self
                    .rings
                    .get(start_key)
                    .and_then(|r| r.distance_to_start(end_location))
                else {
                    continue;
                };
                if distance < max_distance_squared {
                    connections.push(Connection {
                        distance,
                        end_id,
                        start_id,
                    });
                }
            }
        }

        // Longest first, so popping yields the shortest. Ties are broken by
        // node ids to keep runs reproducible.
        connections.sort_by(|a, b| {
            b.distance
                .total_cmp(&a.distance)
                .then(b.end_id.cmp(&a.end_id))
                .then(b.start_id.cmp(&a.start_id))
        });

        while let Some(connection) = connections.pop() {
            connections.retain(|other| !connection.shares_endpoint(other));

            let (Some(&end_key), Some(&start_key)) = (
                self.end_nodes.get(&connection.end_id),
                self.start_nodes.get(&connection.start_id),
            ) else {
                continue;
            };
            let (Some(end_ring), Some(start_ring)) = (self.rings.get(end_key), self.rings.get(start_key))
            else {
                continue;
            };

            log::debug!(
                "Closing ring between node {} and node {}",
                connection.end_id,
                connection.start_id
            );
            self.fixed_rings += 1;

            output.add_error_point(
                end_ring.last_point(),
                ErrorCategory::FixedEndPoint,
                Some(end_ring.last_node_id()),
            );
            output.add_error_point(
                start_ring.first_point(),
                ErrorCategory::FixedEndPoint,
                Some(start_ring.first_node_id()),
            );

            if end_ring.last_location() != start_ring.first_location() {
                let line = LineString::from(vec![end_ring.last_point(), start_ring.first_point()]);
                output.add_error_line(line, ErrorCategory::AddedLine, None);
            }

            if end_key == start_key {
                if let Some(ring) = self.rings.get_mut(end_key) {
                    ring.close_ring();
                }
                self.end_nodes.remove(&connection.end_id);
                self.start_nodes.remove(&connection.start_id);
                continue;
            }

            let Some(start_ring) = self.rings.remove(start_key) else {
                continue;
            };
            let Some(ring) = self.rings.get_mut(end_key) else {
                continue;
            };
            ring.join_over_gap(start_ring);

            self.end_nodes.remove(&connection.end_id);
            self.start_nodes.remove(&connection.start_id);

            if ring.first_location() == ring.last_location() {
                let (first_id, last_id) = (ring.first_node_id(), ring.last_node_id());
                if first_id != last_id {
                    output.add_error_point(ring.first_point(), ErrorCategory::DoubleNode, Some(first_id));
                }
                self.start_nodes.remove(&first_id);
                self.end_nodes.remove(&last_id);
                ring.fake_close();
            } else {
                self.end_nodes.insert(ring.last_node_id(), end_key);
            }
        }
    }
}
