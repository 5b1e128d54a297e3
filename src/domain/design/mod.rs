mod coupling;
mod demands;
mod resources;
mod routing;
mod snapshot;
mod srgs;
mod topology;

use bimap::BiMap;
use slotmap::SlotMap;

use crate::domain::demand::{Demand, RoutingType};
use crate::domain::element::PathElement;
use crate::domain::ids::{
    AttributeMap, DemandId, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId,
    ResourceId, RouteId, SrgId,
};
use crate::domain::layer::NetworkLayer;
use crate::domain::link::Link;
use crate::domain::multicast::{MulticastDemand, MulticastTree};
use crate::domain::node::Node;
use crate::domain::resource::Resource;
use crate::domain::route::Route;
use crate::domain::srg::SharedRiskGroup;
use crate::domain::traffic::forwarding;
use crate::error::{Error, Result};

/// The multilayer network design: one aggregate owning every entity store.
///
/// All cross-entity relationships (incidence, route membership, coupling,
/// SRG membership, occupation) are key-valued caches maintained here. Every
/// mutator validates first and mutates after, so a failed call leaves no
/// observable change. Mutation is plain `&mut self`: callers needing
/// concurrent access must serialize externally, the model holds no locks.
#[derive(Debug, Clone)]
pub struct NetworkDesign {
    pub(crate) name: String,
    pub(crate) attributes: AttributeMap,

    next_uid: u64,

    pub(crate) layers: SlotMap<LayerId, NetworkLayer>,
    pub(crate) layer_order: Vec<LayerId>,
    pub(crate) default_layer: LayerId,

    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) node_order: Vec<NodeId>,

    pub(crate) links: SlotMap<LinkId, Link>,
    pub(crate) demands: SlotMap<DemandId, Demand>,
    pub(crate) multicast_demands: SlotMap<MulticastDemandId, MulticastDemand>,
    pub(crate) routes: SlotMap<RouteId, Route>,
    pub(crate) trees: SlotMap<MulticastTreeId, MulticastTree>,

    pub(crate) resources: SlotMap<ResourceId, Resource>,
    pub(crate) resource_order: Vec<ResourceId>,

    pub(crate) srgs: SlotMap<SrgId, SharedRiskGroup>,
    pub(crate) srg_order: Vec<SrgId>,

    /// The 1:1 inter-layer coupling pairs: lower-layer demand realizing an
    /// upper-layer link.
    pub(crate) coupling: BiMap<DemandId, LinkId>,
}

impl NetworkDesign {
    /// Creates an empty design with one default layer.
    pub fn new(name: impl Into<String>) -> Self {
        let mut design = Self {
            name: name.into(),
            attributes: AttributeMap::new(),
            next_uid: 0,
            layers: SlotMap::with_key(),
            layer_order: Vec::new(),
            default_layer: LayerId::default(),
            nodes: SlotMap::with_key(),
            node_order: Vec::new(),
            links: SlotMap::with_key(),
            demands: SlotMap::with_key(),
            multicast_demands: SlotMap::with_key(),
            routes: SlotMap::with_key(),
            trees: SlotMap::with_key(),
            resources: SlotMap::with_key(),
            resource_order: Vec::new(),
            srgs: SlotMap::with_key(),
            srg_order: Vec::new(),
            coupling: BiMap::new(),
        };

        let uid = design.next_uid();
        let default = design.layers.insert(NetworkLayer {
            uid,
            name: "default".to_string(),
            description: String::new(),
            link_capacity_units: String::new(),
            demand_traffic_units: String::new(),
            attributes: AttributeMap::new(),
            links: Vec::new(),
            demands: Vec::new(),
            multicast_demands: Vec::new(),
            routes: Vec::new(),
            trees: Vec::new(),
        });
        design.layer_order.push(default);
        design.default_layer = default;

        design
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub(crate) fn next_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    //-----------------------
    // --- Entity lookups ---
    //-----------------------

    pub fn layer(&self, id: LayerId) -> Option<&NetworkLayer> {
        self.layers.get(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn demand(&self, id: DemandId) -> Option<&Demand> {
        self.demands.get(id)
    }

    pub fn multicast_demand(&self, id: MulticastDemandId) -> Option<&MulticastDemand> {
        self.multicast_demands.get(id)
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn multicast_tree(&self, id: MulticastTreeId) -> Option<&MulticastTree> {
        self.trees.get(id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn srg(&self, id: SrgId) -> Option<&SharedRiskGroup> {
        self.srgs.get(id)
    }

    pub fn default_layer(&self) -> LayerId {
        self.default_layer
    }

    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_order
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    pub fn resource_ids(&self) -> &[ResourceId] {
        &self.resource_order
    }

    pub fn srg_ids(&self) -> &[SrgId] {
        &self.srg_order
    }

    /// Current index of a node (renumbered on removals). The slotmap key
    /// stays stable; this is the positional view GUIs and reports use.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.node_order.iter().position(|n| *n == id)
    }

    pub fn layer_index(&self, id: LayerId) -> Option<usize> {
        self.layer_order.iter().position(|l| *l == id)
    }

    pub fn link_index(&self, id: LinkId) -> Option<usize> {
        let link = self.links.get(id)?;
        self.layers.get(link.layer)?.links.iter().position(|l| *l == id)
    }

    pub fn demand_index(&self, id: DemandId) -> Option<usize> {
        let demand = self.demands.get(id)?;
        self.layers.get(demand.layer)?.demands.iter().position(|d| *d == id)
    }

    pub fn route_index(&self, id: RouteId) -> Option<usize> {
        let route = self.routes.get(id)?;
        self.layers.get(route.layer)?.routes.iter().position(|r| *r == id)
    }

    pub fn resource_index(&self, id: ResourceId) -> Option<usize> {
        self.resource_order.iter().position(|r| *r == id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_order.iter().copied().find(|n| self.nodes[*n].name == name)
    }

    pub fn find_layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layer_order.iter().copied().find(|l| self.layers[*l].name == name)
    }

    /// All resources of one type, in insertion order.
    pub fn resources_of_type(&self, type_name: &str) -> Vec<ResourceId> {
        self.resource_order
            .iter()
            .copied()
            .filter(|r| self.resources[*r].type_name == type_name)
            .collect()
    }

    //--------------------------------
    // --- Checked lookups (crate) ---
    //--------------------------------

    pub(crate) fn layer_ref(&self, id: LayerId) -> Result<&NetworkLayer> {
        self.layers.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown layer {:?}", id)))
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown node {:?}", id)))
    }

    pub(crate) fn link_ref(&self, id: LinkId) -> Result<&Link> {
        self.links.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown link {:?}", id)))
    }

    pub(crate) fn demand_ref(&self, id: DemandId) -> Result<&Demand> {
        self.demands.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown demand {:?}", id)))
    }

    pub(crate) fn multicast_demand_ref(&self, id: MulticastDemandId) -> Result<&MulticastDemand> {
        self.multicast_demands
            .get(id)
            .ok_or_else(|| Error::ReferentialIntegrity(format!("unknown multicast demand {:?}", id)))
    }

    pub(crate) fn route_ref(&self, id: RouteId) -> Result<&Route> {
        self.routes.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown route {:?}", id)))
    }

    pub(crate) fn tree_ref(&self, id: MulticastTreeId) -> Result<&MulticastTree> {
        self.trees.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown multicast tree {:?}", id)))
    }

    pub(crate) fn resource_ref(&self, id: ResourceId) -> Result<&Resource> {
        self.resources.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown resource {:?}", id)))
    }

    pub(crate) fn srg_ref(&self, id: SrgId) -> Result<&SharedRiskGroup> {
        self.srgs.get(id).ok_or_else(|| Error::ReferentialIntegrity(format!("unknown SRG {:?}", id)))
    }

    //----------------------------
    // --- Failure state views ---
    //----------------------------

    /// Effective node state: its planned flag, and no containing SRG down.
    pub fn node_is_up(&self, id: NodeId) -> bool {
        match self.nodes.get(id) {
            Some(node) => node.up && node.srgs.iter().all(|s| self.srgs[*s].up),
            None => false,
        }
    }

    /// Effective link state: its planned flag, no containing SRG down, and
    /// both endpoints effectively up.
    pub fn link_is_up(&self, id: LinkId) -> bool {
        match self.links.get(id) {
            Some(link) => {
                link.up
                    && link.srgs.iter().all(|s| self.srgs[*s].up)
                    && self.node_is_up(link.origin)
                    && self.node_is_up(link.destination)
            }
            None => false,
        }
    }

    /// A route is down when any traversed link, node or resource host is
    /// effectively down.
    pub fn route_is_down(&self, id: RouteId) -> bool {
        let Some(route) = self.routes.get(id) else {
            return true;
        };
        for element in &route.path {
            match element {
                PathElement::Link(l) => {
                    if !self.link_is_up(*l) {
                        return true;
                    }
                }
                PathElement::Resource(r) => match self.resources.get(*r) {
                    Some(resource) => {
                        if !self.node_is_up(resource.host) {
                            return true;
                        }
                    }
                    None => return true,
                },
            }
        }
        false
    }

    /// A tree is down when any tree link (or incident node) is down.
    pub fn tree_is_down(&self, id: MulticastTreeId) -> bool {
        let Some(tree) = self.trees.get(id) else {
            return true;
        };
        tree.links.iter().any(|l| !self.link_is_up(*l))
    }

    /// Links of a layer currently flagged oversubscribed.
    pub fn oversubscribed_links(&self, layer: LayerId) -> Vec<LinkId> {
        let Some(layer) = self.layers.get(layer) else {
            return Vec::new();
        };
        layer.links.iter().copied().filter(|l| self.links[*l].is_oversubscribed()).collect()
    }

    /// Total blocked traffic over a layer's demands.
    pub fn blocked_traffic(&self, layer: LayerId) -> f64 {
        let Some(layer) = self.layers.get(layer) else {
            return 0.0;
        };
        layer.demands.iter().map(|d| self.demands[*d].blocked_traffic()).sum()
    }

    //--------------------------------
    // --- Derived traffic refresh ---
    //--------------------------------

    /// Recomputes every carried/occupied cache from the primary state:
    /// route and tree contributions of up routes/trees, hop-by-hop flows
    /// resolved from forwarding rules under the current failure state, and
    /// the capacity of coupled links (pinned to the carried traffic of the
    /// realizing demand).
    ///
    /// Fails only when a hop-by-hop demand's rules form a closed loop that
    /// cannot reach a stable flow assignment; callers that mutate state
    /// before refreshing must restore the previous state on that error.
    pub(crate) fn refresh_traffic_state(&mut self) -> Result<()> {
        // Zero the link caches.
        for (_, link) in self.links.iter_mut() {
            link.carried_traffic = 0.0;
            link.occupied_capacity = 0.0;
        }

        // Route contributions, skipping down routes.
        let route_ids: Vec<RouteId> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].routes.iter().copied())
            .collect();
        for route_id in route_ids {
            if self.route_is_down(route_id) {
                continue;
            }
            let route = &self.routes[route_id];
            let contributions: Vec<(LinkId, f64, f64)> = route
                .path
                .iter()
                .zip(route.occupation.iter())
                .filter_map(|(e, occ)| e.as_link().map(|l| (l, route.carried_traffic, *occ)))
                .collect();
            for (link_id, carried, occupied) in contributions {
                let link = &mut self.links[link_id];
                link.carried_traffic += carried;
                link.occupied_capacity += occupied;
            }
        }

        // Tree contributions, skipping down trees.
        let tree_ids: Vec<MulticastTreeId> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].trees.iter().copied())
            .collect();
        for tree_id in tree_ids {
            if self.tree_is_down(tree_id) {
                continue;
            }
            let tree = &self.trees[tree_id];
            let contributions: Vec<(LinkId, f64, f64)> =
                tree.links.iter().map(|l| (*l, tree.carried_traffic, tree.occupied_capacity)).collect();
            for (link_id, carried, occupied) in contributions {
                let link = &mut self.links[link_id];
                link.carried_traffic += carried;
                link.occupied_capacity += occupied;
            }
        }

        // Demand carried traffic.
        let demand_ids: Vec<DemandId> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].demands.iter().copied())
            .collect();
        for demand_id in demand_ids {
            match self.demands[demand_id].routing_type {
                RoutingType::SourceRouting => {
                    let carried: f64 = self.demands[demand_id]
                        .routes
                        .iter()
                        .filter(|r| !self.route_is_down(**r))
                        .map(|r| self.routes[*r].carried_traffic)
                        .sum();
                    let demand = &mut self.demands[demand_id];
                    demand.carried_traffic = carried;
                    demand.hop_by_hop_link_traffic.clear();
                }
                RoutingType::HopByHop => {
                    let flows = forwarding::resolve_demand_flows(self, demand_id)?;
                    for (link_id, traffic) in &flows.link_traffic {
                        let link = &mut self.links[*link_id];
                        link.carried_traffic += *traffic;
                        link.occupied_capacity += *traffic;
                    }
                    let demand = &mut self.demands[demand_id];
                    demand.carried_traffic = flows.delivered;
                    demand.hop_by_hop_link_traffic = flows.link_traffic;
                }
            }
        }

        // Multicast demand carried traffic: delivered to *every* egress.
        let mcast_ids: Vec<MulticastDemandId> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].multicast_demands.iter().copied())
            .collect();
        for mcast_id in mcast_ids {
            let demand = &self.multicast_demands[mcast_id];
            let mut min_delivered = f64::INFINITY;
            for egress in &demand.egress_nodes {
                let delivered: f64 = demand
                    .trees
                    .iter()
                    .filter(|t| !self.tree_is_down(**t))
                    .filter(|t| self.trees[**t].reached_egress.contains(egress))
                    .map(|t| self.trees[*t].carried_traffic)
                    .sum();
                min_delivered = min_delivered.min(delivered);
            }
            if demand.egress_nodes.is_empty() {
                min_delivered = 0.0;
            }
            self.multicast_demands[mcast_id].carried_traffic = min_delivered;
        }

        // Coupled links realize their demand's carried traffic as capacity.
        let pairs: Vec<(DemandId, LinkId)> =
            self.coupling.iter().map(|(d, l)| (*d, *l)).collect();
        for (demand_id, link_id) in pairs {
            let carried = self.demands[demand_id].carried_traffic;
            self.links[link_id].capacity = carried;
        }

        Ok(())
    }

    /// Runs a fallible mutation with rollback: on error the design is
    /// restored byte-for-byte to the state before the call.
    pub(crate) fn transactional<T>(
        &mut self,
        mutate: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.clone();
        match mutate(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                *self = saved;
                Err(e)
            }
        }
    }
}
