use std::collections::BTreeSet;

use crate::domain::demand::RoutingType;
use crate::domain::design::NetworkDesign;
use crate::domain::ids::{DemandId, LinkId, MulticastDemandId, NodeId};

/// Direction of the inter-layer walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationDirection {
    /// Toward the physical layers: from a demand to the links that carry
    /// it, from a link to the lower-layer demand realizing it.
    Downward,
    /// Toward the logical layers: from a link to the demands that can
    /// carry traffic over it, from a demand to the upper-layer link it
    /// realizes.
    Upward,
}

/// A set of links, demands and (multicast demand, egress) flows — both the
/// seed of a propagation query and its result. Ordered sets keep results
/// independent of traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSet {
    pub links: BTreeSet<LinkId>,
    pub demands: BTreeSet<DemandId>,
    pub multicast_flows: BTreeSet<(MulticastDemandId, NodeId)>,
}

impl ElementSet {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.demands.is_empty() && self.multicast_flows.is_empty()
    }

    pub fn with_link(mut self, link: LinkId) -> Self {
        self.links.insert(link);
        self
    }

    pub fn with_demand(mut self, demand: DemandId) -> Self {
        self.demands.insert(demand);
        self
    }

    pub fn with_multicast_flow(mut self, demand: MulticastDemandId, egress: NodeId) -> Self {
        self.multicast_flows.insert((demand, egress));
        self
    }
}

/// Closure of the elements affected by the seed set when walking coupling
/// edges in one direction.
///
/// Within a layer the walk follows "can actually carry traffic of":
/// a demand reaches the links its routes (or positive forwarding rules)
/// put traffic on, a link reaches the demands whose routes/rules traverse
/// it, a multicast flow reaches the tree links on the path to its egress.
/// Between layers it follows the coupling pairs in the requested
/// direction. The coupling relation is acyclic by construction, and the
/// worklist only grows the result sets, so the fixpoint terminates and is
/// traversal-order independent.
pub fn affected_closure(
    design: &NetworkDesign,
    seed: &ElementSet,
    direction: PropagationDirection,
) -> ElementSet {
    let mut closure = seed.clone();

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Item {
        Link(LinkId),
        Demand(DemandId),
        MulticastFlow(MulticastDemandId, NodeId),
    }

    let mut worklist: Vec<Item> = Vec::new();
    worklist.extend(closure.links.iter().map(|l| Item::Link(*l)));
    worklist.extend(closure.demands.iter().map(|d| Item::Demand(*d)));
    worklist.extend(closure.multicast_flows.iter().map(|(m, e)| Item::MulticastFlow(*m, *e)));

    while let Some(item) = worklist.pop() {
        match item {
            Item::Demand(demand) => {
                match direction {
                    PropagationDirection::Downward => {
                        for link in carrier_links(design, demand) {
                            if closure.links.insert(link) {
                                worklist.push(Item::Link(link));
                            }
                        }
                    }
                    PropagationDirection::Upward => {
                        if let Some(demand_ref) = design.demand(demand) {
                            if let Some(link) = demand_ref.coupled_link() {
                                if closure.links.insert(link) {
                                    worklist.push(Item::Link(link));
                                }
                            }
                        }
                    }
                }
            }
            Item::MulticastFlow(mcast, egress) => {
                // Multicast demands cannot be coupled; their flows only
                // expand within the layer, toward the carrying links.
                if direction == PropagationDirection::Downward {
                    for link in multicast_flow_links(design, mcast, egress) {
                        if closure.links.insert(link) {
                            worklist.push(Item::Link(link));
                        }
                    }
                }
            }
            Item::Link(link) => match direction {
                PropagationDirection::Downward => {
                    if let Some(link_ref) = design.link(link) {
                        if let Some(demand) = link_ref.coupled_demand() {
                            if closure.demands.insert(demand) {
                                worklist.push(Item::Demand(demand));
                            }
                        }
                    }
                }
                PropagationDirection::Upward => {
                    for demand in carrying_demands(design, link) {
                        if closure.demands.insert(demand) {
                            worklist.push(Item::Demand(demand));
                        }
                    }
                    for (mcast, egress) in carrying_multicast_flows(design, link) {
                        if closure.multicast_flows.insert((mcast, egress)) {
                            worklist.push(Item::MulticastFlow(mcast, egress));
                        }
                    }
                }
            },
        }
    }

    closure
}

/// Links that can actually carry traffic of a demand: the links of its
/// routes (including attached backups) for source routing, the links with
/// a positive forwarding rule for hop-by-hop.
fn carrier_links(design: &NetworkDesign, demand: DemandId) -> Vec<LinkId> {
    let Some(demand_ref) = design.demand(demand) else {
        return Vec::new();
    };
    let mut links: BTreeSet<LinkId> = BTreeSet::new();
    match demand_ref.routing_type() {
        RoutingType::SourceRouting => {
            for route in demand_ref.routes() {
                if let Some(route_ref) = design.route(*route) {
                    links.extend(route_ref.link_sequence());
                }
            }
        }
        RoutingType::HopByHop => {
            links.extend(demand_ref.forwarding_rules().iter().filter(|(_, r)| **r > 0.0).map(|(l, _)| *l));
        }
    }
    links.into_iter().collect()
}

/// Demands of the link's layer that can put traffic on it.
fn carrying_demands(design: &NetworkDesign, link: LinkId) -> Vec<DemandId> {
    let Some(link_ref) = design.link(link) else {
        return Vec::new();
    };
    let Some(layer) = design.layer(link_ref.layer()) else {
        return Vec::new();
    };
    layer
        .demands()
        .iter()
        .copied()
        .filter(|d| carrier_links(design, *d).contains(&link))
        .collect()
}

/// (multicast demand, egress) flows whose in-tree path crosses the link.
fn carrying_multicast_flows(design: &NetworkDesign, link: LinkId) -> Vec<(MulticastDemandId, NodeId)> {
    let Some(link_ref) = design.link(link) else {
        return Vec::new();
    };
    let Some(layer) = design.layer(link_ref.layer()) else {
        return Vec::new();
    };
    let mut flows = Vec::new();
    for mcast in layer.multicast_demands() {
        let demand_ref = design.multicast_demand(*mcast).expect("layer lists existing demands");
        for egress in demand_ref.egress_nodes() {
            if multicast_flow_links(design, *mcast, *egress).contains(&link) {
                flows.push((*mcast, *egress));
            }
        }
    }
    flows
}

/// Links on the root→egress path of any tree of the multicast demand that
/// reaches that egress.
fn multicast_flow_links(design: &NetworkDesign, mcast: MulticastDemandId, egress: NodeId) -> Vec<LinkId> {
    let Some(demand_ref) = design.multicast_demand(mcast) else {
        return Vec::new();
    };
    let ingress = demand_ref.ingress();
    let mut links: BTreeSet<LinkId> = BTreeSet::new();
    for tree in demand_ref.trees() {
        let Some(tree_ref) = design.multicast_tree(*tree) else {
            continue;
        };
        if !tree_ref.reached_egress().contains(&egress) {
            continue;
        }
        // Walk from the egress to the root along the single-parent links.
        let mut cursor = egress;
        while cursor != ingress {
            let Some(parent) = tree_ref
                .links()
                .iter()
                .find(|l| design.link(**l).map(|lr| lr.destination() == cursor).unwrap_or(false))
            else {
                break;
            };
            links.insert(*parent);
            cursor = design.link(*parent).expect("checked above").origin();
        }
    }
    links.into_iter().collect()
}
