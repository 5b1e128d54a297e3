use crate::domain::design::NetworkDesign;
use crate::domain::ids::{AttributeMap, LayerId, LinkId, NodeId};
use crate::domain::layer::NetworkLayer;
use crate::domain::link::Link;
use crate::domain::node::Node;
use crate::error::{Error, Result};

impl NetworkDesign {
    //--------------------
    // --- Layer ops ---
    //--------------------

    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        link_capacity_units: impl Into<String>,
        demand_traffic_units: impl Into<String>,
    ) -> LayerId {
        let uid = self.next_uid();
        let layer = self.layers.insert(NetworkLayer {
            uid,
            name: name.into(),
            description: description.into(),
            link_capacity_units: link_capacity_units.into(),
            demand_traffic_units: demand_traffic_units.into(),
            attributes: AttributeMap::new(),
            links: Vec::new(),
            demands: Vec::new(),
            multicast_demands: Vec::new(),
            routes: Vec::new(),
            trees: Vec::new(),
        });
        self.layer_order.push(layer);
        log::debug!("Added layer '{}' ({:?})", self.layers[layer].name, layer);
        layer
    }

    /// Removes a layer and everything inside it (links, demands, routes,
    /// trees, couplings touching it). The default layer cannot be removed;
    /// point the default elsewhere first.
    pub fn remove_layer(&mut self, layer: LayerId) -> Result<()> {
        self.layer_ref(layer)?;
        if layer == self.default_layer {
            return Err(Error::InvariantViolation(format!(
                "layer {:?} is the default layer and cannot be removed",
                layer
            )));
        }

        self.transactional(|design| {
            let demands = design.layers[layer].demands.clone();
            for demand in demands {
                design.purge_demand(demand);
            }
            let mcasts = design.layers[layer].multicast_demands.clone();
            for mcast in mcasts {
                design.purge_multicast_demand(mcast);
            }
            let links = design.layers[layer].links.clone();
            for link in links {
                design.purge_link(link);
            }
            design.layer_order.retain(|l| *l != layer);
            design.layers.remove(layer);
            design.refresh_traffic_state()
        })
    }

    pub fn set_default_layer(&mut self, layer: LayerId) -> Result<()> {
        self.layer_ref(layer)?;
        self.default_layer = layer;
        Ok(())
    }

    //-------------------
    // --- Node ops ---
    //-------------------

    pub fn add_node(&mut self, name: impl Into<String>, x: f64, y: f64) -> NodeId {
        let uid = self.next_uid();
        let node = self.nodes.insert(Node {
            uid,
            name: name.into(),
            x,
            y,
            up: true,
            attributes: AttributeMap::new(),
            out_links: Vec::new(),
            in_links: Vec::new(),
            resources: Vec::new(),
            srgs: Vec::new(),
        });
        self.node_order.push(node);
        log::debug!("Added node '{}' ({:?})", self.nodes[node].name, node);
        node
    }

    /// Removes a node, cascading to incident links, the demands ending at
    /// it, the routes/trees crossing it and its SRG membership.
    ///
    /// Fails while resources are hosted at the node; use
    /// `remove_node_cascading` to drop those too.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let node_ref = self.node_ref(node)?;
        if !node_ref.resources.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "node '{}' still hosts {} resource(s); removal requires explicit cascading",
                node_ref.name,
                node_ref.resources.len()
            )));
        }
        self.transactional(|design| {
            design.purge_node(node);
            design.refresh_traffic_state()
        })
    }

    /// Removes a node together with its hosted resources (and the routes
    /// traversing those resources).
    pub fn remove_node_cascading(&mut self, node: NodeId) -> Result<()> {
        self.node_ref(node)?;
        self.transactional(|design| {
            let resources = design.nodes[node].resources.clone();
            for resource in resources {
                design.purge_resource(resource);
            }
            design.purge_node(node);
            design.refresh_traffic_state()
        })
    }

    pub fn set_node_name(&mut self, node: NodeId, name: impl Into<String>) -> Result<()> {
        self.node_ref(node)?;
        self.nodes[node].name = name.into();
        Ok(())
    }

    pub fn set_node_position(&mut self, node: NodeId, x: f64, y: f64) -> Result<()> {
        self.node_ref(node)?;
        let n = &mut self.nodes[node];
        n.x = x;
        n.y = y;
        Ok(())
    }

    pub fn node_attributes_mut(&mut self, node: NodeId) -> Result<&mut AttributeMap> {
        self.node_ref(node)?;
        Ok(&mut self.nodes[node].attributes)
    }

    /// Sets the planned up/down state of a node and recomputes all derived
    /// traffic. What-if events from a simulation collaborator enter here.
    pub fn set_node_state(&mut self, node: NodeId, up: bool) -> Result<()> {
        self.node_ref(node)?;
        self.transactional(|design| {
            design.nodes[node].up = up;
            design.refresh_traffic_state()
        })
    }

    //-------------------
    // --- Link ops ---
    //-------------------

    /// Adds a directed link. Origin and destination must be distinct,
    /// existing nodes; the link lives in `layer`.
    pub fn add_link(
        &mut self,
        layer: LayerId,
        origin: NodeId,
        destination: NodeId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_s: f64,
    ) -> Result<LinkId> {
        self.layer_ref(layer)?;
        self.node_ref(origin)?;
        self.node_ref(destination)?;
        if origin == destination {
            return Err(Error::InvariantViolation("link origin and destination must differ".to_string()));
        }
        if capacity < 0.0 || length_km < 0.0 {
            return Err(Error::InvariantViolation(format!(
                "link capacity ({}) and length ({}) must be non-negative",
                capacity, length_km
            )));
        }

        let uid = self.next_uid();
        let link = self.links.insert(Link {
            uid,
            layer,
            origin,
            destination,
            capacity,
            length_km,
            propagation_speed_km_s,
            up: true,
            attributes: AttributeMap::new(),
            traversing_routes: Vec::new(),
            traversing_trees: Vec::new(),
            srgs: Vec::new(),
            coupled_demand: None,
            carried_traffic: 0.0,
            occupied_capacity: 0.0,
        });
        self.layers[layer].links.push(link);
        self.nodes[origin].out_links.push(link);
        self.nodes[destination].in_links.push(link);
        log::debug!(
            "Added link {:?} '{}' -> '{}' in layer '{}'",
            link,
            self.nodes[origin].name,
            self.nodes[destination].name,
            self.layers[layer].name
        );
        Ok(link)
    }

    /// Removes a link, cascading to the routes/trees traversing it and the
    /// forwarding rules over it, and releasing any coupling.
    pub fn remove_link(&mut self, link: LinkId) -> Result<()> {
        self.link_ref(link)?;
        self.transactional(|design| {
            design.purge_link(link);
            design.refresh_traffic_state()
        })
    }

    /// Changes the link capacity. Rejected for coupled links, whose
    /// capacity is pinned to the realizing demand's carried traffic.
    pub fn set_link_capacity(&mut self, link: LinkId, capacity: f64) -> Result<()> {
        let link_ref = self.link_ref(link)?;
        if link_ref.coupled_demand.is_some() {
            return Err(Error::InvariantViolation(format!(
                "link {:?} is coupled; its capacity follows the realizing demand",
                link
            )));
        }
        if capacity < 0.0 {
            return Err(Error::InvariantViolation(format!("link capacity must be non-negative, got {}", capacity)));
        }
        self.links[link].capacity = capacity;
        Ok(())
    }

    pub fn link_attributes_mut(&mut self, link: LinkId) -> Result<&mut AttributeMap> {
        self.link_ref(link)?;
        Ok(&mut self.links[link].attributes)
    }

    /// Sets the planned up/down state of a link and recomputes all derived
    /// traffic.
    pub fn set_link_state(&mut self, link: LinkId, up: bool) -> Result<()> {
        self.link_ref(link)?;
        self.transactional(|design| {
            design.links[link].up = up;
            design.refresh_traffic_state()
        })
    }

    //-----------------------------
    // --- Cascade helpers ---
    //-----------------------------

    /// Removes a link and every dependent cache entry, without refreshing
    /// derived traffic. Callers refresh (or roll back) afterwards.
    pub(crate) fn purge_link(&mut self, link: LinkId) {
        let routes: Vec<_> = self.links[link].traversing_routes.clone();
        for route in routes {
            self.purge_route(route);
        }
        let trees: Vec<_> = self.links[link].traversing_trees.clone();
        for tree in trees {
            self.purge_tree(tree);
        }

        // Forwarding rules over this link, in any demand of its layer.
        let layer = self.links[link].layer;
        let demands = self.layers[layer].demands.clone();
        for demand in demands {
            self.demands[demand].forwarding_rules.remove(&link);
            self.demands[demand].hop_by_hop_link_traffic.remove(&link);
        }

        if let Some(demand) = self.links[link].coupled_demand {
            self.coupling.remove_by_right(&link);
            self.demands[demand].coupled_link = None;
        }

        let srgs = self.links[link].srgs.clone();
        for srg in srgs {
            self.srgs[srg].links.retain(|l| *l != link);
        }

        let origin = self.links[link].origin;
        let destination = self.links[link].destination;
        self.nodes[origin].out_links.retain(|l| *l != link);
        self.nodes[destination].in_links.retain(|l| *l != link);

        self.layers[layer].links.retain(|l| *l != link);
        self.links.remove(link);
    }

    /// Removes a node and everything incident to it (links with their
    /// routes, demands ending here, multicast demands touching it, SRG
    /// membership). Hosted resources must be gone already.
    pub(crate) fn purge_node(&mut self, node: NodeId) {
        let incident: Vec<LinkId> = self.nodes[node]
            .out_links
            .iter()
            .chain(self.nodes[node].in_links.iter())
            .copied()
            .collect();
        for link in incident {
            self.purge_link(link);
        }

        let demands: Vec<_> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].demands.iter().copied())
            .filter(|d| self.demands[*d].ingress == node || self.demands[*d].egress == node)
            .collect();
        for demand in demands {
            self.purge_demand(demand);
        }

        let mcasts: Vec<_> = self
            .layer_order
            .iter()
            .flat_map(|l| self.layers[*l].multicast_demands.iter().copied())
            .filter(|m| {
                let m = &self.multicast_demands[*m];
                m.ingress == node || m.egress_nodes.contains(&node)
            })
            .collect();
        for mcast in mcasts {
            self.purge_multicast_demand(mcast);
        }

        let srgs = self.nodes[node].srgs.clone();
        for srg in srgs {
            self.srgs[srg].nodes.retain(|n| *n != node);
        }

        self.node_order.retain(|n| *n != node);
        self.nodes.remove(node);
    }
}
