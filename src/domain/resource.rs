use std::collections::BTreeMap;

use crate::domain::ids::{AttributeMap, NodeId, ResourceId, RouteId};

/// A capacitated resource hosted at a node (CPU, RAM, a NAT or firewall
/// instance, ...), traversable by service-chain routes.
///
/// A resource may consume capacity from *base* resources on the same node
/// (a VNF instance eating CPU/RAM), forming a cycle-free consumption
/// hierarchy. Unlike links, resource capacity is enforced hard: route
/// occupation that would exceed it is rejected at registration time.
#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) uid: u64,
    pub(crate) name: String,

    /// Type tag routes are matched against (e.g. "CPU", "NAT").
    pub(crate) type_name: String,

    pub(crate) host: NodeId,

    pub(crate) capacity: f64,
    pub(crate) capacity_unit: String,

    /// Per-traversal processing time, used as extra delay by the
    /// service-chain admissibility limits.
    pub(crate) processing_time_ms: f64,

    /// Capacity occupied by each traversing route.
    pub(crate) occupation: BTreeMap<RouteId, f64>,

    /// Capacity this resource consumes from base resources (same node).
    pub(crate) consumes_from_base: BTreeMap<ResourceId, f64>,

    /// Mirror of `consumes_from_base` seen from the base side.
    pub(crate) consumed_by_upper: BTreeMap<ResourceId, f64>,

    pub(crate) attributes: AttributeMap,
}

impl Resource {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn capacity_unit(&self) -> &str {
        &self.capacity_unit
    }

    pub fn processing_time_ms(&self) -> f64 {
        self.processing_time_ms
    }

    pub fn occupation(&self) -> &BTreeMap<RouteId, f64> {
        &self.occupation
    }

    pub fn consumes_from_base(&self) -> &BTreeMap<ResourceId, f64> {
        &self.consumes_from_base
    }

    pub fn consumed_by_upper(&self) -> &BTreeMap<ResourceId, f64> {
        &self.consumed_by_upper
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Total occupied capacity: route occupation plus what upper resources
    /// consume from this one.
    pub fn occupied_capacity(&self) -> f64 {
        let by_routes: f64 = self.occupation.values().sum();
        let by_upper: f64 = self.consumed_by_upper.values().sum();
        by_routes + by_upper
    }

    pub fn available_capacity(&self) -> f64 {
        (self.capacity - self.occupied_capacity()).max(0.0)
    }
}
