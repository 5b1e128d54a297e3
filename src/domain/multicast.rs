use crate::domain::ids::{AttributeMap, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId};

/// A one-to-many traffic demand: one ingress, a set of egress nodes.
///
/// Served by zero or more multicast trees, each carrying a fraction of the
/// offered traffic to a subset (or all) of the egress nodes.
#[derive(Debug, Clone)]
pub struct MulticastDemand {
    pub(crate) uid: u64,
    pub(crate) layer: LayerId,
    pub(crate) ingress: NodeId,
    pub(crate) egress_nodes: Vec<NodeId>,

    pub(crate) offered_traffic: f64,

    pub(crate) attributes: AttributeMap,

    pub(crate) trees: Vec<MulticastTreeId>,

    /// Cache: max over the up trees of their carried traffic, since every
    /// tree delivers the same content.
    pub(crate) carried_traffic: f64,
}

impl MulticastDemand {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn ingress(&self) -> NodeId {
        self.ingress
    }

    pub fn egress_nodes(&self) -> &[NodeId] {
        &self.egress_nodes
    }

    pub fn offered_traffic(&self) -> f64 {
        self.offered_traffic
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn trees(&self) -> &[MulticastTreeId] {
        &self.trees
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    pub fn blocked_traffic(&self) -> f64 {
        (self.offered_traffic - self.carried_traffic).max(0.0)
    }
}

/// A directed tree of links rooted at the multicast demand's ingress,
/// reaching a subset of its egress nodes.
#[derive(Debug, Clone)]
pub struct MulticastTree {
    pub(crate) uid: u64,
    pub(crate) layer: LayerId,
    pub(crate) demand: MulticastDemandId,

    /// Tree links, in the insertion order the caller gave. Tree shape
    /// (single parent, rooted, acyclic) is validated on add.
    pub(crate) links: Vec<LinkId>,

    /// The demand egress nodes this tree actually reaches.
    pub(crate) reached_egress: Vec<NodeId>,

    pub(crate) carried_traffic: f64,

    /// Capacity occupied on every tree link.
    pub(crate) occupied_capacity: f64,

    pub(crate) attributes: AttributeMap,
}

impl MulticastTree {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn demand(&self) -> MulticastDemandId {
        self.demand
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn reached_egress(&self) -> &[NodeId] {
        &self.reached_egress
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    pub fn occupied_capacity(&self) -> f64 {
        self.occupied_capacity
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
}
