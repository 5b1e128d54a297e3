use std::collections::BTreeMap;

use crate::domain::ids::{AttributeMap, LayerId, LinkId, NodeId, RouteId};

/// How a demand's offered traffic is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingType {
    /// Explicit routes with caller-assigned carried traffic (e.g. an
    /// optimization result written back into the model).
    SourceRouting,

    /// Fractional forwarding rules per (node, outgoing link), resolved by
    /// the flow-conservation sweep in `domain::traffic`.
    HopByHop,
}

/// A unicast traffic demand between two nodes of one layer.
#[derive(Debug, Clone)]
pub struct Demand {
    pub(crate) uid: u64,
    pub(crate) layer: LayerId,
    pub(crate) ingress: NodeId,
    pub(crate) egress: NodeId,

    pub(crate) offered_traffic: f64,
    pub(crate) routing_type: RoutingType,

    /// Ordered resource-type names every route of this demand must
    /// traverse (service-chain request). Empty for plain demands.
    pub(crate) service_chain: Vec<String>,

    pub(crate) attributes: AttributeMap,

    pub(crate) routes: Vec<RouteId>,

    /// Hop-by-hop split ratios per outgoing link. The node the rule acts
    /// at is the link's origin; per node the splits sum to at most one.
    pub(crate) forwarding_rules: BTreeMap<LinkId, f64>,

    /// Per-link traffic of this demand as resolved from the forwarding
    /// rules. Empty for source-routed demands.
    pub(crate) hop_by_hop_link_traffic: BTreeMap<LinkId, f64>,

    /// The upper-layer link this demand realizes, when coupled.
    pub(crate) coupled_link: Option<LinkId>,

    pub(crate) carried_traffic: f64,
}

impl Demand {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn ingress(&self) -> NodeId {
        self.ingress
    }

    pub fn egress(&self) -> NodeId {
        self.egress
    }

    pub fn offered_traffic(&self) -> f64 {
        self.offered_traffic
    }

    pub fn routing_type(&self) -> RoutingType {
        self.routing_type
    }

    pub fn service_chain(&self) -> &[String] {
        &self.service_chain
    }

    pub fn has_service_chain(&self) -> bool {
        !self.service_chain.is_empty()
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn routes(&self) -> &[RouteId] {
        &self.routes
    }

    pub fn forwarding_rules(&self) -> &BTreeMap<LinkId, f64> {
        &self.forwarding_rules
    }

    pub fn hop_by_hop_link_traffic(&self) -> &BTreeMap<LinkId, f64> {
        &self.hop_by_hop_link_traffic
    }

    pub fn coupled_link(&self) -> Option<LinkId> {
        self.coupled_link
    }

    pub fn is_coupled(&self) -> bool {
        self.coupled_link.is_some()
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    /// Offered traffic that is currently not delivered. Never negative.
    pub fn blocked_traffic(&self) -> f64 {
        (self.offered_traffic - self.carried_traffic).max(0.0)
    }
}
