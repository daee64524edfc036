//! Topology operations: listing, links, placement and radio settings.

use mesh_events::{
    ConnectivityChange, GeoPoint, LinkedPeer, NetworkView, NodeId, NodeSummary, PeerDistance,
};
use tracing::info;

use super::MeshSimulation;
use crate::components::node::{NodeName, Position, Radio};
use crate::components::world::{LinkSet, NodeIndex};
use crate::error::MeshError;
use crate::geo::great_circle_distance;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl MeshSimulation {
    /// Every node in id order.
    pub fn nodes(&self) -> Vec<NodeSummary> {
        self.node_ids()
            .into_iter()
            .filter_map(|id| self.node(id).ok())
            .collect()
    }

    pub fn node(&self, id: NodeId) -> Result<NodeSummary, MeshError> {
        let radio = self.component::<Radio>(id)?;
        Ok(NodeSummary {
            node_id: id,
            name: self.component::<NodeName>(id)?.0.clone(),
            position: self.component::<Position>(id)?.0,
            range_m: radio.range_m,
            auto_relay: radio.auto_relay,
        })
    }

    /// Explicit links as `(lower id, higher id)` pairs.
    pub fn links(&self) -> Vec<(NodeId, NodeId)> {
        self.world.resource::<LinkSet>().iter().collect()
    }

    /// Link two nodes regardless of distance. Returns false if the link existed.
    pub fn add_link(&mut self, a: NodeId, b: NodeId) -> Result<bool, MeshError> {
        if a == b {
            return Err(MeshError::SelfLink(a));
        }
        self.entity(a)?;
        self.entity(b)?;
        let added = self.world.resource_mut::<LinkSet>().add(a, b);
        if added {
            info!(%a, %b, "link added");
        }
        Ok(added)
    }

    pub fn remove_link(&mut self, a: NodeId, b: NodeId) -> Result<(), MeshError> {
        if !self.world.resource_mut::<LinkSet>().remove(a, b) {
            return Err(MeshError::UnknownLink(a, b));
        }
        info!(%a, %b, "link removed");
        Ok(())
    }

    pub fn set_range(&mut self, node: NodeId, range_m: f64) -> Result<(), MeshError> {
        let placement = &self.config().placement;
        let (min, max) = (placement.min_range_m, placement.max_range_m);
        if !(min..=max).contains(&range_m) {
            return Err(MeshError::OutOfRange {
                field: "range_m",
                min,
                max,
                value: range_m,
            });
        }
        self.component_mut::<Radio>(node)?.range_m = range_m;
        Ok(())
    }

    pub fn set_auto_relay(&mut self, node: NodeId, auto_relay: bool) -> Result<(), MeshError> {
        self.component_mut::<Radio>(node)?.auto_relay = auto_relay;
        Ok(())
    }

    /// Move a node and report which peers entered or left its own broadcast
    /// range. Explicit links are not part of the comparison.
    pub fn set_position(
        &mut self,
        node: NodeId,
        position: GeoPoint,
    ) -> Result<ConnectivityChange, MeshError> {
        if !(-90.0..=90.0).contains(&position.latitude) {
            return Err(MeshError::OutOfRange {
                field: "latitude",
                min: -90.0,
                max: 90.0,
                value: position.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&position.longitude) {
            return Err(MeshError::OutOfRange {
                field: "longitude",
                min: -180.0,
                max: 180.0,
                value: position.longitude,
            });
        }

        let old_position = self.component::<Position>(node)?.0;
        let radio = *self.component::<Radio>(node)?;
        let before = self.peers_within(node, old_position, radio.range_m);
        let after = self.peers_within(node, position, radio.range_m);

        self.component_mut::<Position>(node)?.0 = position;

        Ok(ConnectivityChange {
            node_id: node,
            old_position,
            new_position: position,
            lost_connections: before.iter().filter(|p| !after.contains(p)).copied().collect(),
            new_connections: after.iter().filter(|p| !before.contains(p)).copied().collect(),
        })
    }

    /// Who `node` can reach, who can reach `node`, and its explicit links.
    pub fn network_view(&self, node: NodeId) -> Result<NetworkView, MeshError> {
        let position = self.component::<Position>(node)?.0;
        let range_m = self.component::<Radio>(node)?.range_m;

        let mut in_range = Vec::new();
        let mut reaching_me = Vec::new();
        for other in self.node_ids().into_iter().filter(|&id| id != node) {
            let (Ok(other_pos), Ok(other_radio)) =
                (self.component::<Position>(other), self.component::<Radio>(other))
            else {
                continue;
            };
            let distance = great_circle_distance(position, other_pos.0);
            if distance <= range_m {
                in_range.push(PeerDistance {
                    node_id: other,
                    distance_m: round1(distance),
                    range_m: other_radio.range_m,
                });
            }
            if other_radio.covers(distance) {
                reaching_me.push(PeerDistance {
                    node_id: other,
                    distance_m: round1(distance),
                    range_m: other_radio.range_m,
                });
            }
        }

        let nodes_connected = self
            .world
            .resource::<LinkSet>()
            .peers_of(node)
            .into_iter()
            .filter_map(|peer| {
                self.component::<Position>(peer).ok().map(|p| LinkedPeer {
                    node_id: peer,
                    position: p.0,
                })
            })
            .collect();

        Ok(NetworkView {
            node_id: node,
            position,
            broadcast_range_m: range_m,
            nodes_in_my_range: in_range,
            nodes_that_can_reach_me: reaching_me,
            nodes_connected,
        })
    }

    fn peers_within(&self, node: NodeId, from: GeoPoint, range_m: f64) -> Vec<NodeId> {
        let index = self.world.resource::<NodeIndex>();
        index
            .iter()
            .filter(|&(id, _)| id != node)
            .filter_map(|(id, entity)| self.world.get::<Position>(entity).map(|p| (id, p.0)))
            .filter(|&(_, p)| great_circle_distance(from, p) <= range_m)
            .map(|(id, _)| id)
            .collect()
    }
}
