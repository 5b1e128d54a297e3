use std::collections::BTreeSet;

use crate::domain::EPS;
use crate::domain::demand::RoutingType;
use crate::domain::design::NetworkDesign;
use crate::domain::element::PathElement;
use crate::domain::ids::{
    DemandId, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId, ResourceId, RouteId,
};
use crate::domain::multicast::MulticastTree;
use crate::domain::route::Route;
use crate::error::{Error, Result};

impl NetworkDesign {
    //--------------------
    // --- Route ops ---
    //--------------------

    /// Adds a route for a source-routed demand, occupying `occupied`
    /// capacity on every traversed element.
    pub fn add_route(
        &mut self,
        demand: DemandId,
        carried_traffic: f64,
        occupied: f64,
        path: Vec<PathElement>,
    ) -> Result<RouteId> {
        let occupation = vec![occupied; path.len()];
        self.add_route_with_occupation(demand, carried_traffic, occupation, path)
    }

    /// Adds a route with per-element occupied capacity (segments may
    /// differ when a route is partially failed).
    ///
    /// The path must be a connected walk from the demand's ingress to its
    /// egress, traversing one resource per service-chain entry, in order.
    /// Resource capacity is checked hard; link capacity is not (links
    /// track oversubscription instead).
    pub fn add_route_with_occupation(
        &mut self,
        demand: DemandId,
        carried_traffic: f64,
        occupation: Vec<f64>,
        path: Vec<PathElement>,
    ) -> Result<RouteId> {
        let demand_ref = self.demand_ref(demand)?;
        if demand_ref.routing_type != RoutingType::SourceRouting {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} is hop-by-hop routed; routes apply to source-routed demands",
                demand
            )));
        }
        if carried_traffic < 0.0 {
            return Err(Error::InvariantViolation(format!("carried traffic must be non-negative, got {}", carried_traffic)));
        }
        if occupation.len() != path.len() {
            return Err(Error::InvariantViolation(format!(
                "occupation vector length {} does not match path length {}",
                occupation.len(),
                path.len()
            )));
        }
        if occupation.iter().any(|o| *o < 0.0) {
            return Err(Error::InvariantViolation("occupied capacity must be non-negative".to_string()));
        }

        self.validate_route_path(demand, &path)?;

        // 100% rule: the demand's routes never carry more than offered.
        let nominal_carried: f64 = demand_ref.routes.iter().map(|r| self.routes[*r].carried_traffic).sum();
        if nominal_carried + carried_traffic > demand_ref.offered_traffic + EPS {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} routes would carry {} exceeding offered traffic {}",
                demand,
                nominal_carried + carried_traffic,
                demand_ref.offered_traffic
            )));
        }

        // Hard capacity check on every traversed resource.
        for (resource, occ) in Self::resource_occupation_of(&path, &occupation) {
            let resource_ref = self.resource_ref(resource)?;
            if resource_ref.occupied_capacity() + occ > resource_ref.capacity + EPS {
                return Err(Error::InvariantViolation(format!(
                    "resource '{}' has {} capacity left, route needs {}",
                    resource_ref.name,
                    resource_ref.available_capacity(),
                    occ
                )));
            }
        }

        let layer = demand_ref.layer;
        let route = self.transactional(|design| {
            let uid = design.next_uid();
            let route = design.routes.insert(Route {
                uid,
                layer,
                demand,
                path: path.clone(),
                occupation: occupation.clone(),
                carried_traffic,
                backup_of: None,
                backups: Vec::new(),
                attributes: Default::default(),
            });

            design.layers[layer].routes.push(route);
            design.demands[demand].routes.push(route);
            let mut seen_links: BTreeSet<LinkId> = BTreeSet::new();
            for element in &path {
                if let PathElement::Link(l) = element {
                    if seen_links.insert(*l) {
                        design.links[*l].traversing_routes.push(route);
                    }
                }
            }
            for (resource, occ) in Self::resource_occupation_of(&path, &occupation) {
                *design.resources[resource].occupation.entry(route).or_insert(0.0) += occ;
            }

            design.refresh_traffic_state()?;
            Ok(route)
        })?;
        log::debug!("Added route {:?} for demand {:?}, carrying {}", route, demand, carried_traffic);
        Ok(route)
    }

    /// Removes a route, releasing its occupation everywhere and detaching
    /// its backup linkage in both directions (attached backups survive as
    /// plain routes).
    pub fn remove_route(&mut self, route: RouteId) -> Result<()> {
        self.route_ref(route)?;
        self.transactional(|design| {
            design.purge_route(route);
            design.refresh_traffic_state()
        })
    }

    /// Updates carried traffic and the uniform per-element occupation of a
    /// route (an optimization result written back, or restoration logic
    /// shifting traffic to a backup).
    pub fn set_route_traffic(&mut self, route: RouteId, carried_traffic: f64, occupied: f64) -> Result<()> {
        let route_ref = self.route_ref(route)?;
        if carried_traffic < 0.0 || occupied < 0.0 {
            return Err(Error::InvariantViolation(
                "carried traffic and occupied capacity must be non-negative".to_string(),
            ));
        }
        let demand = route_ref.demand;
        let demand_ref = self.demand_ref(demand)?;
        let nominal_other: f64 = demand_ref
            .routes
            .iter()
            .filter(|r| **r != route)
            .map(|r| self.routes[*r].carried_traffic)
            .sum();
        if nominal_other + carried_traffic > demand_ref.offered_traffic + EPS {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} routes would carry {} exceeding offered traffic {}",
                demand,
                nominal_other + carried_traffic,
                demand_ref.offered_traffic
            )));
        }

        let path = route_ref.path.clone();
        let new_occupation = vec![occupied; path.len()];
        for (resource, new_occ) in Self::resource_occupation_of(&path, &new_occupation) {
            let resource_ref = &self.resources[resource];
            let old_occ = resource_ref.occupation.get(&route).copied().unwrap_or(0.0);
            if resource_ref.occupied_capacity() - old_occ + new_occ > resource_ref.capacity + EPS {
                return Err(Error::InvariantViolation(format!(
                    "resource '{}' cannot take occupied capacity {}",
                    resource_ref.name, new_occ
                )));
            }
        }

        self.transactional(|design| {
            for (resource, new_occ) in Self::resource_occupation_of(&path, &new_occupation) {
                design.resources[resource].occupation.insert(route, new_occ);
            }
            let route_mut = &mut design.routes[route];
            route_mut.carried_traffic = carried_traffic;
            route_mut.occupation = new_occupation.clone();
            design.refresh_traffic_state()
        })
    }

    //-----------------------------
    // --- Backup route linkage ---
    //-----------------------------

    /// Attaches `backup` as a backup of `primary`. Pure annotation: no
    /// traffic moves until external restoration logic decides to.
    pub fn add_backup_route(&mut self, primary: RouteId, backup: RouteId) -> Result<()> {
        let primary_ref = self.route_ref(primary)?;
        let backup_ref = self.route_ref(backup)?;
        if primary == backup {
            return Err(Error::InvariantViolation("a route cannot back up itself".to_string()));
        }
        if primary_ref.demand != backup_ref.demand {
            return Err(Error::InvariantViolation(format!(
                "routes {:?} and {:?} serve different demands",
                primary, backup
            )));
        }
        if primary_ref.backup_of.is_some() {
            return Err(Error::InvariantViolation(format!(
                "route {:?} is itself a backup; backups cannot be nested",
                primary
            )));
        }
        if backup_ref.backup_of.is_some() {
            return Err(Error::InvariantViolation(format!("route {:?} is already a backup", backup)));
        }
        if !backup_ref.backups.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "route {:?} has backups of its own and cannot become a backup",
                backup
            )));
        }

        self.routes[primary].backups.push(backup);
        self.routes[backup].backup_of = Some(primary);
        Ok(())
    }

    /// Detaches a backup from its primary. Neither route is removed.
    pub fn remove_backup_route(&mut self, primary: RouteId, backup: RouteId) -> Result<()> {
        self.route_ref(primary)?;
        let backup_ref = self.route_ref(backup)?;
        if backup_ref.backup_of != Some(primary) {
            return Err(Error::InvariantViolation(format!(
                "route {:?} is not a backup of route {:?}",
                backup, primary
            )));
        }
        self.routes[primary].backups.retain(|r| *r != backup);
        self.routes[backup].backup_of = None;
        Ok(())
    }

    //-------------------------
    // --- Multicast trees ---
    //-------------------------

    /// Adds a multicast tree: `links` must form a directed tree rooted at
    /// the demand's ingress, reaching at least one of its egress nodes.
    pub fn add_multicast_tree(
        &mut self,
        mcast: MulticastDemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        links: Vec<LinkId>,
    ) -> Result<MulticastTreeId> {
        let demand_ref = self.multicast_demand_ref(mcast)?;
        if carried_traffic < 0.0 || occupied_capacity < 0.0 {
            return Err(Error::InvariantViolation(
                "carried traffic and occupied capacity must be non-negative".to_string(),
            ));
        }
        let layer = demand_ref.layer;
        let ingress = demand_ref.ingress;
        let egress_nodes = demand_ref.egress_nodes.clone();

        let reached = self.validate_tree_links(mcast, layer, ingress, &links)?;
        let reached_egress: Vec<NodeId> =
            egress_nodes.iter().copied().filter(|e| reached.contains(e)).collect();
        if reached_egress.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "tree for multicast demand {:?} reaches none of its egress nodes",
                mcast
            )));
        }

        // Per egress node, the trees reaching it never deliver more than
        // the offered traffic.
        for egress in &reached_egress {
            let delivered: f64 = demand_ref
                .trees
                .iter()
                .filter(|t| self.trees[**t].reached_egress.contains(egress))
                .map(|t| self.trees[*t].carried_traffic)
                .sum();
            if delivered + carried_traffic > demand_ref.offered_traffic + EPS {
                return Err(Error::InvariantViolation(format!(
                    "trees of multicast demand {:?} would deliver {} to node '{}', above offered {}",
                    mcast,
                    delivered + carried_traffic,
                    self.nodes[*egress].name,
                    demand_ref.offered_traffic
                )));
            }
        }

        self.transactional(|design| {
            let uid = design.next_uid();
            let tree = design.trees.insert(MulticastTree {
                uid,
                layer,
                demand: mcast,
                links: links.clone(),
                reached_egress: reached_egress.clone(),
                carried_traffic,
                occupied_capacity,
                attributes: Default::default(),
            });
            design.layers[layer].trees.push(tree);
            design.multicast_demands[mcast].trees.push(tree);
            for link in &links {
                design.links[*link].traversing_trees.push(tree);
            }

            design.refresh_traffic_state()?;
            Ok(tree)
        })
    }

    pub fn remove_multicast_tree(&mut self, tree: MulticastTreeId) -> Result<()> {
        self.tree_ref(tree)?;
        self.transactional(|design| {
            design.purge_tree(tree);
            design.refresh_traffic_state()
        })
    }

    pub fn set_multicast_tree_traffic(
        &mut self,
        tree: MulticastTreeId,
        carried_traffic: f64,
        occupied_capacity: f64,
    ) -> Result<()> {
        let tree_ref = self.tree_ref(tree)?;
        if carried_traffic < 0.0 || occupied_capacity < 0.0 {
            return Err(Error::InvariantViolation(
                "carried traffic and occupied capacity must be non-negative".to_string(),
            ));
        }
        let mcast = tree_ref.demand;
        let demand_ref = &self.multicast_demands[mcast];
        for egress in tree_ref.reached_egress.clone() {
            let delivered_other: f64 = demand_ref
                .trees
                .iter()
                .filter(|t| **t != tree && self.trees[**t].reached_egress.contains(&egress))
                .map(|t| self.trees[*t].carried_traffic)
                .sum();
            if delivered_other + carried_traffic > demand_ref.offered_traffic + EPS {
                return Err(Error::InvariantViolation(format!(
                    "trees of multicast demand {:?} would deliver {} to node '{}', above offered {}",
                    mcast,
                    delivered_other + carried_traffic,
                    self.nodes[egress].name,
                    demand_ref.offered_traffic
                )));
            }
        }
        self.transactional(|design| {
            let tree_mut = &mut design.trees[tree];
            tree_mut.carried_traffic = carried_traffic;
            tree_mut.occupied_capacity = occupied_capacity;
            design.refresh_traffic_state()
        })
    }

    //-----------------------------
    // --- Validation helpers ---
    //-----------------------------

    /// Checks that a path is a connected ingress→egress walk whose
    /// resources match the demand's service chain in order.
    pub(crate) fn validate_route_path(&self, demand: DemandId, path: &[PathElement]) -> Result<()> {
        let demand_ref = &self.demands[demand];
        if path.is_empty() {
            return Err(Error::InvariantViolation("route path must not be empty".to_string()));
        }

        let mut current = demand_ref.ingress;
        let mut chain_pos = 0usize;
        for element in path {
            match element {
                PathElement::Link(l) => {
                    let link = self.link_ref(*l)?;
                    if link.layer != demand_ref.layer {
                        return Err(Error::ReferentialIntegrity(format!(
                            "route link {:?} is not in the demand's layer",
                            l
                        )));
                    }
                    if link.origin != current {
                        return Err(Error::InvariantViolation(format!(
                            "route path is disconnected: link {:?} starts at '{}', walk is at '{}'",
                            l, self.nodes[link.origin].name, self.nodes[current].name
                        )));
                    }
                    current = link.destination;
                }
                PathElement::Resource(r) => {
                    let resource = self.resource_ref(*r)?;
                    if resource.host != current {
                        return Err(Error::InvariantViolation(format!(
                            "route traverses resource '{}' hosted at '{}', but the walk is at '{}'",
                            resource.name, self.nodes[resource.host].name, self.nodes[current].name
                        )));
                    }
                    match demand_ref.service_chain.get(chain_pos) {
                        Some(expected) if *expected == resource.type_name => chain_pos += 1,
                        Some(expected) => {
                            return Err(Error::InvariantViolation(format!(
                                "route resource '{}' has type '{}' where the service chain expects '{}'",
                                resource.name, resource.type_name, expected
                            )));
                        }
                        None => {
                            return Err(Error::InvariantViolation(format!(
                                "route traverses resource '{}' beyond the demand's service chain",
                                resource.name
                            )));
                        }
                    }
                }
            }
        }
        if current != demand_ref.egress {
            return Err(Error::InvariantViolation(format!(
                "route path ends at '{}' instead of the demand egress '{}'",
                self.nodes[current].name, self.nodes[demand_ref.egress].name
            )));
        }
        if chain_pos != demand_ref.service_chain.len() {
            return Err(Error::InvariantViolation(format!(
                "route traverses {} of the {} service-chain resources",
                chain_pos,
                demand_ref.service_chain.len()
            )));
        }
        Ok(())
    }

    /// Checks tree shape (single parent, rooted at ingress, no stray
    /// links) and returns the set of reached nodes.
    pub(crate) fn validate_tree_links(
        &self,
        mcast: MulticastDemandId,
        layer: LayerId,
        ingress: NodeId,
        links: &[LinkId],
    ) -> Result<BTreeSet<NodeId>> {
        if links.is_empty() {
            return Err(Error::InvariantViolation("multicast tree needs at least one link".to_string()));
        }
        let mut unique = BTreeSet::new();
        let mut parents: BTreeSet<NodeId> = BTreeSet::new();
        for link in links {
            let link_ref = self.link_ref(*link)?;
            if link_ref.layer != layer {
                return Err(Error::ReferentialIntegrity(format!(
                    "tree link {:?} is not in the layer of multicast demand {:?}",
                    link, mcast
                )));
            }
            if !unique.insert(*link) {
                return Err(Error::InvariantViolation(format!("tree link {:?} appears twice", link)));
            }
            if link_ref.destination == ingress {
                return Err(Error::InvariantViolation("tree has a link into its root".to_string()));
            }
            if !parents.insert(link_ref.destination) {
                return Err(Error::InvariantViolation(format!(
                    "node '{}' has two parents in the tree",
                    self.nodes[link_ref.destination].name
                )));
            }
        }

        // Fixpoint reachability from the root over the candidate links.
        let mut reached: BTreeSet<NodeId> = BTreeSet::new();
        reached.insert(ingress);
        let mut pending: Vec<LinkId> = links.to_vec();
        loop {
            let before = pending.len();
            pending.retain(|l| {
                let link = &self.links[*l];
                if reached.contains(&link.origin) {
                    reached.insert(link.destination);
                    false
                } else {
                    true
                }
            });
            if pending.is_empty() {
                break;
            }
            if pending.len() == before {
                return Err(Error::InvariantViolation(format!(
                    "{} tree link(s) are not reachable from the root",
                    pending.len()
                )));
            }
        }
        Ok(reached)
    }

    /// (resource, total occupation) pairs of a path, merging repeated
    /// traversals of the same resource.
    fn resource_occupation_of(path: &[PathElement], occupation: &[f64]) -> Vec<(ResourceId, f64)> {
        let mut merged: std::collections::BTreeMap<ResourceId, f64> = Default::default();
        for (element, occ) in path.iter().zip(occupation.iter()) {
            if let PathElement::Resource(r) = element {
                *merged.entry(*r).or_insert(0.0) += *occ;
            }
        }
        merged.into_iter().collect()
    }

    //-----------------------------
    // --- Cascade helpers ---
    //-----------------------------

    /// Removes a route and all its cache entries. No refresh.
    pub(crate) fn purge_route(&mut self, route: RouteId) {
        let backups = self.routes[route].backups.clone();
        for backup in backups {
            self.routes[backup].backup_of = None;
        }
        if let Some(primary) = self.routes[route].backup_of {
            self.routes[primary].backups.retain(|r| *r != route);
        }

        let path = self.routes[route].path.clone();
        for element in &path {
            match element {
                PathElement::Link(l) => {
                    if let Some(link) = self.links.get_mut(*l) {
                        link.traversing_routes.retain(|r| *r != route);
                    }
                }
                PathElement::Resource(r) => {
                    if let Some(resource) = self.resources.get_mut(*r) {
                        resource.occupation.remove(&route);
                    }
                }
            }
        }

        let demand = self.routes[route].demand;
        if let Some(demand) = self.demands.get_mut(demand) {
            demand.routes.retain(|r| *r != route);
        }
        let layer = self.routes[route].layer;
        self.layers[layer].routes.retain(|r| *r != route);
        self.routes.remove(route);
    }

    /// Removes a multicast tree and all its cache entries. No refresh.
    pub(crate) fn purge_tree(&mut self, tree: MulticastTreeId) {
        let links = self.trees[tree].links.clone();
        for link in links {
            if let Some(link) = self.links.get_mut(link) {
                link.traversing_trees.retain(|t| *t != tree);
            }
        }
        let demand = self.trees[tree].demand;
        if let Some(demand) = self.multicast_demands.get_mut(demand) {
            demand.trees.retain(|t| *t != tree);
        }
        let layer = self.trees[tree].layer;
        self.layers[layer].trees.retain(|t| *t != tree);
        self.trees.remove(tree);
    }
}
