use std::collections::BTreeMap;

use crate::domain::EPS;
use crate::domain::design::NetworkDesign;
use crate::domain::ids::{AttributeMap, NodeId, ResourceId};
use crate::domain::resource::Resource;
use crate::error::{Error, Result};

impl NetworkDesign {
    //----------------------
    // --- Resource ops ---
    //----------------------

    /// Adds a resource at a node. `base_consumption` names resources on
    /// the *same node* this one eats capacity from (a VNF consuming
    /// CPU/RAM); those consumptions are capacity-checked hard here.
    pub fn add_resource(
        &mut self,
        host: NodeId,
        type_name: impl Into<String>,
        name: impl Into<String>,
        capacity: f64,
        capacity_unit: impl Into<String>,
        processing_time_ms: f64,
        base_consumption: BTreeMap<ResourceId, f64>,
    ) -> Result<ResourceId> {
        self.node_ref(host)?;
        let type_name = type_name.into();
        let name = name.into();
        if type_name.is_empty() {
            return Err(Error::InvariantViolation("resource type name must not be empty".to_string()));
        }
        if capacity < 0.0 || processing_time_ms < 0.0 {
            return Err(Error::InvariantViolation(format!(
                "resource capacity ({}) and processing time ({}) must be non-negative",
                capacity, processing_time_ms
            )));
        }
        for (base, consumed) in &base_consumption {
            let base_ref = self.resource_ref(*base)?;
            if base_ref.host != host {
                return Err(Error::ReferentialIntegrity(format!(
                    "base resource '{}' lives at '{}', not at the new resource's host '{}'",
                    base_ref.name, self.nodes[base_ref.host].name, self.nodes[host].name
                )));
            }
            if *consumed < 0.0 {
                return Err(Error::InvariantViolation("base consumption must be non-negative".to_string()));
            }
            if base_ref.occupied_capacity() + *consumed > base_ref.capacity + EPS {
                return Err(Error::InvariantViolation(format!(
                    "base resource '{}' has {} capacity left, consumption of {} requested",
                    base_ref.name,
                    base_ref.available_capacity(),
                    consumed
                )));
            }
        }

        let uid = self.next_uid();
        let resource = self.resources.insert(Resource {
            uid,
            name,
            type_name,
            host,
            capacity,
            capacity_unit: capacity_unit.into(),
            processing_time_ms,
            occupation: BTreeMap::new(),
            consumes_from_base: base_consumption.clone(),
            consumed_by_upper: BTreeMap::new(),
            attributes: AttributeMap::new(),
        });
        self.resource_order.push(resource);
        self.nodes[host].resources.push(resource);
        for (base, consumed) in &base_consumption {
            self.resources[*base].consumed_by_upper.insert(resource, *consumed);
        }
        log::debug!(
            "Added resource '{}' of type '{}' at node '{}'",
            self.resources[resource].name,
            self.resources[resource].type_name,
            self.nodes[host].name
        );
        Ok(resource)
    }

    /// Removes a resource. Fails while routes traverse it or upper
    /// resources consume from it; `remove_resource_cascading` drops those
    /// too.
    pub fn remove_resource(&mut self, resource: ResourceId) -> Result<()> {
        let resource_ref = self.resource_ref(resource)?;
        if !resource_ref.occupation.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "resource '{}' is traversed by {} route(s); removal requires explicit cascading",
                resource_ref.name,
                resource_ref.occupation.len()
            )));
        }
        if !resource_ref.consumed_by_upper.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "resource '{}' feeds {} upper resource(s); removal requires explicit cascading",
                resource_ref.name,
                resource_ref.consumed_by_upper.len()
            )));
        }
        self.transactional(|design| {
            design.purge_resource(resource);
            design.refresh_traffic_state()
        })
    }

    /// Removes a resource together with the routes traversing it and the
    /// upper resources consuming from it (recursively).
    pub fn remove_resource_cascading(&mut self, resource: ResourceId) -> Result<()> {
        self.resource_ref(resource)?;
        self.transactional(|design| {
            design.purge_resource(resource);
            design.refresh_traffic_state()
        })
    }

    /// Changes the resource capacity. Shrinking below the current
    /// occupation is rejected (hard capacity rule for resources).
    pub fn set_resource_capacity(&mut self, resource: ResourceId, capacity: f64) -> Result<()> {
        let resource_ref = self.resource_ref(resource)?;
        if capacity < 0.0 {
            return Err(Error::InvariantViolation(format!("resource capacity must be non-negative, got {}", capacity)));
        }
        if resource_ref.occupied_capacity() > capacity + EPS {
            return Err(Error::InvariantViolation(format!(
                "resource '{}' already has {} occupied, cannot shrink capacity to {}",
                resource_ref.name,
                resource_ref.occupied_capacity(),
                capacity
            )));
        }
        self.resources[resource].capacity = capacity;
        Ok(())
    }

    pub fn resource_attributes_mut(&mut self, resource: ResourceId) -> Result<&mut AttributeMap> {
        self.resource_ref(resource)?;
        Ok(&mut self.resources[resource].attributes)
    }

    //-----------------------------
    // --- Cascade helpers ---
    //-----------------------------

    /// Removes a resource, the routes traversing it and recursively the
    /// upper resources consuming from it. No refresh.
    pub(crate) fn purge_resource(&mut self, resource: ResourceId) {
        let uppers: Vec<ResourceId> = self.resources[resource].consumed_by_upper.keys().copied().collect();
        for upper in uppers {
            if self.resources.contains_key(upper) {
                self.purge_resource(upper);
            }
        }

        let routes: Vec<_> = self.resources[resource].occupation.keys().copied().collect();
        for route in routes {
            if self.routes.contains_key(route) {
                self.purge_route(route);
            }
        }

        let bases: Vec<ResourceId> = self.resources[resource].consumes_from_base.keys().copied().collect();
        for base in bases {
            if let Some(base) = self.resources.get_mut(base) {
                base.consumed_by_upper.remove(&resource);
            }
        }

        let host = self.resources[resource].host;
        self.nodes[host].resources.retain(|r| *r != resource);
        self.resource_order.retain(|r| *r != resource);
        self.resources.remove(resource);
    }
}
