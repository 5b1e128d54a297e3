use crate::domain::EPS;
use crate::domain::demand::{Demand, RoutingType};
use crate::domain::design::NetworkDesign;
use crate::domain::ids::{AttributeMap, DemandId, LayerId, LinkId, MulticastDemandId, NodeId};
use crate::domain::multicast::MulticastDemand;
use crate::error::{Error, Result};

impl NetworkDesign {
    //---------------------
    // --- Demand ops ---
    //---------------------

    pub fn add_demand(
        &mut self,
        layer: LayerId,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
        routing_type: RoutingType,
    ) -> Result<DemandId> {
        self.layer_ref(layer)?;
        self.node_ref(ingress)?;
        self.node_ref(egress)?;
        if ingress == egress {
            return Err(Error::InvariantViolation("demand ingress and egress must differ".to_string()));
        }
        if offered_traffic < 0.0 {
            return Err(Error::InvariantViolation(format!(
                "offered traffic must be non-negative, got {}",
                offered_traffic
            )));
        }

        let uid = self.next_uid();
        let demand = self.demands.insert(Demand {
            uid,
            layer,
            ingress,
            egress,
            offered_traffic,
            routing_type,
            service_chain: Vec::new(),
            attributes: AttributeMap::new(),
            routes: Vec::new(),
            forwarding_rules: Default::default(),
            hop_by_hop_link_traffic: Default::default(),
            coupled_link: None,
            carried_traffic: 0.0,
        });
        self.layers[layer].demands.push(demand);
        log::debug!(
            "Added demand {:?} '{}' -> '{}' offered {}",
            demand,
            self.nodes[ingress].name,
            self.nodes[egress].name,
            offered_traffic
        );
        Ok(demand)
    }

    /// Removes a demand with its routes and forwarding rules, releasing
    /// any coupling.
    pub fn remove_demand(&mut self, demand: DemandId) -> Result<()> {
        self.demand_ref(demand)?;
        self.transactional(|design| {
            design.purge_demand(demand);
            design.refresh_traffic_state()
        })
    }

    /// Changes the offered traffic. For coupled demands the new carried
    /// traffic propagates into the coupled link's capacity on refresh.
    /// Lowering offered below the traffic already carried by the demand's
    /// routes is rejected.
    pub fn set_demand_offered_traffic(&mut self, demand: DemandId, offered: f64) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        if offered < 0.0 {
            return Err(Error::InvariantViolation(format!("offered traffic must be non-negative, got {}", offered)));
        }
        let nominal_carried: f64 = demand_ref.routes.iter().map(|r| self.routes[*r].carried_traffic).sum();
        if nominal_carried > offered + EPS {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} routes already carry {} which exceeds the new offered traffic {}",
                demand, nominal_carried, offered
            )));
        }
        self.transactional(|design| {
            design.demands[demand].offered_traffic = offered;
            design.refresh_traffic_state()
        })
    }

    /// Sets the ordered resource types every route of this demand must
    /// traverse. Rejected once routes exist (they were validated against
    /// the previous sequence).
    pub fn set_demand_service_chain(&mut self, demand: DemandId, chain: Vec<String>) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        if !demand_ref.routes.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} already has {} route(s); remove them before changing the service chain",
                demand,
                demand_ref.routes.len()
            )));
        }
        self.demands[demand].service_chain = chain;
        Ok(())
    }

    pub fn demand_attributes_mut(&mut self, demand: DemandId) -> Result<&mut AttributeMap> {
        self.demand_ref(demand)?;
        Ok(&mut self.demands[demand].attributes)
    }

    //-----------------------------
    // --- Forwarding rule ops ---
    //-----------------------------

    /// Sets one hop-by-hop split ratio: the fraction of this demand's
    /// traffic present at the link's origin node that leaves over the
    /// link. A ratio of zero removes the rule.
    pub fn set_forwarding_rule(&mut self, demand: DemandId, link: LinkId, splitting_ratio: f64) -> Result<()> {
        self.validate_forwarding_rule(demand, link, splitting_ratio)?;
        self.transactional(|design| {
            if splitting_ratio <= 0.0 {
                design.demands[demand].forwarding_rules.remove(&link);
            } else {
                design.demands[demand].forwarding_rules.insert(link, splitting_ratio);
            }
            design.refresh_traffic_state()
        })
    }

    /// Replaces all forwarding rules of a demand in one call.
    pub fn set_forwarding_rules(&mut self, demand: DemandId, rules: &[(LinkId, f64)]) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        if demand_ref.routing_type != RoutingType::HopByHop {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} is source-routed; forwarding rules apply to hop-by-hop demands",
                demand
            )));
        }
        let layer = demand_ref.layer;
        let mut per_node: std::collections::BTreeMap<NodeId, f64> = Default::default();
        for (link, ratio) in rules {
            let link_ref = self.link_ref(*link)?;
            if link_ref.layer != layer {
                return Err(Error::ReferentialIntegrity(format!(
                    "forwarding rule link {:?} is not in the demand's layer",
                    link
                )));
            }
            if *ratio < 0.0 || *ratio > 1.0 + EPS {
                return Err(Error::InvariantViolation(format!("splitting ratio {} outside [0, 1]", ratio)));
            }
            let sum = per_node.entry(link_ref.origin).or_insert(0.0);
            *sum += *ratio;
            if *sum > 1.0 + EPS {
                return Err(Error::InvariantViolation(format!(
                    "splitting ratios at node '{}' sum above one",
                    self.nodes[link_ref.origin].name
                )));
            }
        }
        self.transactional(|design| {
            design.demands[demand].forwarding_rules =
                rules.iter().filter(|(_, r)| *r > 0.0).map(|(l, r)| (*l, *r)).collect();
            design.refresh_traffic_state()
        })
    }

    pub fn remove_forwarding_rule(&mut self, demand: DemandId, link: LinkId) -> Result<()> {
        self.demand_ref(demand)?;
        self.link_ref(link)?;
        self.transactional(|design| {
            design.demands[demand].forwarding_rules.remove(&link);
            design.refresh_traffic_state()
        })
    }

    fn validate_forwarding_rule(&self, demand: DemandId, link: LinkId, ratio: f64) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        let link_ref = self.link_ref(link)?;
        if demand_ref.routing_type != RoutingType::HopByHop {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} is source-routed; forwarding rules apply to hop-by-hop demands",
                demand
            )));
        }
        if link_ref.layer != demand_ref.layer {
            return Err(Error::ReferentialIntegrity(format!(
                "forwarding rule link {:?} is not in the demand's layer",
                link
            )));
        }
        if ratio < 0.0 || ratio > 1.0 + EPS {
            return Err(Error::InvariantViolation(format!("splitting ratio {} outside [0, 1]", ratio)));
        }
        // Existing rules at the same origin node, minus any rule being
        // replaced on this link.
        let origin = link_ref.origin;
        let sum_at_node: f64 = demand_ref
            .forwarding_rules
            .iter()
            .filter(|(l, _)| **l != link && self.links[**l].origin == origin)
            .map(|(_, r)| *r)
            .sum();
        if sum_at_node + ratio > 1.0 + EPS {
            return Err(Error::InvariantViolation(format!(
                "splitting ratios at node '{}' would sum to {} (above one)",
                self.nodes[origin].name,
                sum_at_node + ratio
            )));
        }
        Ok(())
    }

    //-----------------------------
    // --- Multicast demand ops ---
    //-----------------------------

    pub fn add_multicast_demand(
        &mut self,
        layer: LayerId,
        ingress: NodeId,
        egress_nodes: Vec<NodeId>,
        offered_traffic: f64,
    ) -> Result<MulticastDemandId> {
        self.layer_ref(layer)?;
        self.node_ref(ingress)?;
        if egress_nodes.is_empty() {
            return Err(Error::InvariantViolation("multicast demand needs at least one egress node".to_string()));
        }
        for egress in &egress_nodes {
            self.node_ref(*egress)?;
            if *egress == ingress {
                return Err(Error::InvariantViolation(
                    "multicast egress set must not contain the ingress node".to_string(),
                ));
            }
        }
        let mut deduped = egress_nodes.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != egress_nodes.len() {
            return Err(Error::InvariantViolation("multicast egress set contains duplicates".to_string()));
        }
        if offered_traffic < 0.0 {
            return Err(Error::InvariantViolation(format!(
                "offered traffic must be non-negative, got {}",
                offered_traffic
            )));
        }

        let uid = self.next_uid();
        let mcast = self.multicast_demands.insert(MulticastDemand {
            uid,
            layer,
            ingress,
            egress_nodes,
            offered_traffic,
            attributes: AttributeMap::new(),
            trees: Vec::new(),
            carried_traffic: 0.0,
        });
        self.layers[layer].multicast_demands.push(mcast);
        Ok(mcast)
    }

    pub fn remove_multicast_demand(&mut self, mcast: MulticastDemandId) -> Result<()> {
        self.multicast_demand_ref(mcast)?;
        self.transactional(|design| {
            design.purge_multicast_demand(mcast);
            design.refresh_traffic_state()
        })
    }

    //-----------------------------
    // --- Cascade helpers ---
    //-----------------------------

    /// Removes a demand, its routes and rules, releasing any coupling.
    /// No refresh; callers refresh afterwards.
    pub(crate) fn purge_demand(&mut self, demand: DemandId) {
        let routes = self.demands[demand].routes.clone();
        for route in routes {
            self.purge_route(route);
        }
        if let Some(link) = self.demands[demand].coupled_link {
            self.coupling.remove_by_left(&demand);
            self.links[link].coupled_demand = None;
        }
        let layer = self.demands[demand].layer;
        self.layers[layer].demands.retain(|d| *d != demand);
        self.demands.remove(demand);
    }

    pub(crate) fn purge_multicast_demand(&mut self, mcast: MulticastDemandId) {
        let trees = self.multicast_demands[mcast].trees.clone();
        for tree in trees {
            self.purge_tree(tree);
        }
        let layer = self.multicast_demands[mcast].layer;
        self.layers[layer].multicast_demands.retain(|m| *m != mcast);
        self.multicast_demands.remove(mcast);
    }
}
