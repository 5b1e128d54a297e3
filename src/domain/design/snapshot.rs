use std::collections::BTreeMap;

use crate::api::design_dto::{
    BaseConsumptionDto, CouplingDto, DemandDto, DesignDto, ForwardingRuleDto, LayerDto, LinkDto,
    LinkRefDto, MulticastDemandDto, MulticastTreeDto, NodeDto, PathElementDto, ResourceDto, RouteDto,
    SrgDto,
};
use crate::domain::consistency;
use crate::domain::demand::RoutingType;
use crate::domain::design::NetworkDesign;
use crate::domain::element::PathElement;
use crate::domain::ids::{DemandId, LinkId, MulticastDemandId, NodeId, ResourceId, RouteId};
use crate::error::{Error, Result};

const ROUTING_SOURCE: &str = "SOURCE_ROUTING";
const ROUTING_HOP_BY_HOP: &str = "HOP_BY_HOP";

impl NetworkDesign {
    /// Rebuilds a design from a snapshot, replaying it through the public
    /// mutators so every stored invariant is re-validated, and runs the
    /// consistency checker before handing the design out.
    pub fn from_dto(dto: &DesignDto) -> Result<Self> {
        if dto.layers.is_empty() {
            return Err(Error::ReferentialIntegrity("snapshot holds no layers".to_string()));
        }

        let mut design = NetworkDesign::new(dto.name.clone());
        design.attributes = dto.attributes.clone();
        let seed_layer = design.default_layer();

        // Layers first; the seed layer of `new` makes way for them.
        let mut layer_ids = Vec::with_capacity(dto.layers.len());
        for layer in &dto.layers {
            let id = design.add_layer(
                layer.name.clone(),
                layer.description.clone(),
                layer.link_capacity_units.clone(),
                layer.demand_traffic_units.clone(),
            );
            design.layers[id].attributes = layer.attributes.clone();
            layer_ids.push(id);
        }
        let default_layer = *layer_ids.get(dto.default_layer).ok_or_else(|| {
            Error::ReferentialIntegrity(format!("snapshot default layer index {} is out of range", dto.default_layer))
        })?;
        design.set_default_layer(default_layer)?;
        design.remove_layer(seed_layer)?;

        let mut node_ids: Vec<NodeId> = Vec::with_capacity(dto.nodes.len());
        for node in &dto.nodes {
            let id = design.add_node(node.name.clone(), node.x, node.y);
            design.nodes[id].attributes = node.attributes.clone();
            node_ids.push(id);
        }
        let node_at = |index: usize| -> Result<NodeId> {
            node_ids.get(index).copied().ok_or_else(|| {
                Error::ReferentialIntegrity(format!("snapshot references node index {} out of range", index))
            })
        };

        // Resources; a snapshot lists bases before their consumers.
        let mut resource_ids: Vec<ResourceId> = Vec::with_capacity(dto.resources.len());
        for resource in &dto.resources {
            let mut base_consumption: BTreeMap<ResourceId, f64> = BTreeMap::new();
            for base in &resource.base_consumption {
                let base_id = resource_ids.get(base.resource).copied().ok_or_else(|| {
                    Error::ReferentialIntegrity(format!(
                        "resource '{}' consumes from resource index {} not listed before it",
                        resource.name, base.resource
                    ))
                })?;
                base_consumption.insert(base_id, base.consumed);
            }
            let id = design.add_resource(
                node_at(resource.node)?,
                resource.type_name.clone(),
                resource.name.clone(),
                resource.capacity,
                resource.capacity_unit.clone(),
                resource.processing_time_ms,
                base_consumption,
            )?;
            design.resources[id].attributes = resource.attributes.clone();
            resource_ids.push(id);
        }

        // Topology and traffic of every layer.
        let mut link_ids: Vec<Vec<LinkId>> = Vec::with_capacity(dto.layers.len());
        let mut demand_ids: Vec<Vec<DemandId>> = Vec::with_capacity(dto.layers.len());
        let mut mcast_ids: Vec<Vec<MulticastDemandId>> = Vec::with_capacity(dto.layers.len());
        for (layer_index, layer) in dto.layers.iter().enumerate() {
            let layer_id = layer_ids[layer_index];

            let mut links = Vec::with_capacity(layer.links.len());
            for link in &layer.links {
                let id = design.add_link(
                    layer_id,
                    node_at(link.origin)?,
                    node_at(link.destination)?,
                    link.capacity,
                    link.length_km,
                    link.propagation_speed_km_s,
                )?;
                design.links[id].attributes = link.attributes.clone();
                links.push(id);
            }
            link_ids.push(links);

            let mut demands = Vec::with_capacity(layer.demands.len());
            for demand in &layer.demands {
                let routing_type = match demand.routing_type.as_str() {
                    ROUTING_SOURCE => RoutingType::SourceRouting,
                    ROUTING_HOP_BY_HOP => RoutingType::HopByHop,
                    other => {
                        return Err(Error::ReferentialIntegrity(format!(
                            "snapshot demand has unknown routing type '{}'",
                            other
                        )));
                    }
                };
                let id = design.add_demand(
                    layer_id,
                    node_at(demand.ingress)?,
                    node_at(demand.egress)?,
                    demand.offered_traffic,
                    routing_type,
                )?;
                if !demand.service_chain.is_empty() {
                    design.set_demand_service_chain(id, demand.service_chain.clone())?;
                }
                design.demands[id].attributes = demand.attributes.clone();
                demands.push(id);
            }
            demand_ids.push(demands);

            let mut mcasts = Vec::with_capacity(layer.multicast_demands.len());
            for mcast in &layer.multicast_demands {
                let egress = mcast.egress_nodes.iter().map(|n| node_at(*n)).collect::<Result<Vec<_>>>()?;
                let id = design.add_multicast_demand(layer_id, node_at(mcast.ingress)?, egress, mcast.offered_traffic)?;
                design.multicast_demands[id].attributes = mcast.attributes.clone();
                mcasts.push(id);
            }
            mcast_ids.push(mcasts);
        }

        // Routes, backup linkage, trees and forwarding rules.
        for (layer_index, layer) in dto.layers.iter().enumerate() {
            let link_at = |index: usize| -> Result<LinkId> {
                link_ids[layer_index].get(index).copied().ok_or_else(|| {
                    Error::ReferentialIntegrity(format!("snapshot references link index {} out of range", index))
                })
            };

            let mut route_ids: Vec<RouteId> = Vec::with_capacity(layer.routes.len());
            for route in &layer.routes {
                let demand = demand_ids[layer_index].get(route.demand).copied().ok_or_else(|| {
                    Error::ReferentialIntegrity(format!("snapshot references demand index {} out of range", route.demand))
                })?;
                let path = route
                    .path
                    .iter()
                    .map(|element| match element {
                        PathElementDto::Link { index } => link_at(*index).map(PathElement::Link),
                        PathElementDto::Resource { index } => resource_ids
                            .get(*index)
                            .copied()
                            .map(PathElement::Resource)
                            .ok_or_else(|| {
                                Error::ReferentialIntegrity(format!(
                                    "snapshot references resource index {} out of range",
                                    index
                                ))
                            }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let id = design.add_route_with_occupation(demand, route.carried_traffic, route.occupation.clone(), path)?;
                route_ids.push(id);
            }
            for (route_index, route) in layer.routes.iter().enumerate() {
                for backup in &route.backups {
                    let backup_id = route_ids.get(*backup).copied().ok_or_else(|| {
                        Error::ReferentialIntegrity(format!("snapshot references route index {} out of range", backup))
                    })?;
                    design.add_backup_route(route_ids[route_index], backup_id)?;
                }
            }

            for tree in &layer.trees {
                let demand = mcast_ids[layer_index].get(tree.demand).copied().ok_or_else(|| {
                    Error::ReferentialIntegrity(format!(
                        "snapshot references multicast demand index {} out of range",
                        tree.demand
                    ))
                })?;
                let links = tree.links.iter().map(|l| link_at(*l)).collect::<Result<Vec<_>>>()?;
                design.add_multicast_tree(demand, tree.carried_traffic, tree.occupied_capacity, links)?;
            }

            for (demand_index, demand) in layer.demands.iter().enumerate() {
                if demand.forwarding_rules.is_empty() {
                    continue;
                }
                let rules = demand
                    .forwarding_rules
                    .iter()
                    .map(|rule| link_at(rule.link).map(|l| (l, rule.splitting_ratio)))
                    .collect::<Result<Vec<_>>>()?;
                design.set_forwarding_rules(demand_ids[layer_index][demand_index], &rules)?;
            }
        }

        // Shared-risk groups.
        for srg in &dto.srgs {
            let id = design.add_srg(srg.mean_time_to_fail_hours, srg.mean_time_to_repair_hours)?;
            for node in &srg.nodes {
                design.add_node_to_srg(id, node_at(*node)?)?;
            }
            for link in &srg.links {
                let layer_links = link_ids.get(link.layer).ok_or_else(|| {
                    Error::ReferentialIntegrity(format!("snapshot references layer index {} out of range", link.layer))
                })?;
                let link_id = layer_links.get(link.link).copied().ok_or_else(|| {
                    Error::ReferentialIntegrity(format!("snapshot references link index {} out of range", link.link))
                })?;
                design.add_link_to_srg(id, link_id)?;
            }
            design.srgs[id].attributes = srg.attributes.clone();
            if !srg.up {
                design.set_srg_state(id, false)?;
            }
        }

        // Inter-layer couplings.
        for coupling in &dto.couplings {
            let demand = demand_ids
                .get(coupling.demand_layer)
                .and_then(|layer| layer.get(coupling.demand))
                .copied()
                .ok_or_else(|| {
                    Error::ReferentialIntegrity(format!(
                        "snapshot coupling references demand {}/{} out of range",
                        coupling.demand_layer, coupling.demand
                    ))
                })?;
            let link = link_ids
                .get(coupling.link_layer)
                .and_then(|layer| layer.get(coupling.link))
                .copied()
                .ok_or_else(|| {
                    Error::ReferentialIntegrity(format!(
                        "snapshot coupling references link {}/{} out of range",
                        coupling.link_layer, coupling.link
                    ))
                })?;
            design.couple_demand_to_link(demand, link)?;
        }

        // Planned failure states last, so all derived traffic re-settles.
        for (index, node) in dto.nodes.iter().enumerate() {
            if !node.up {
                design.set_node_state(node_ids[index], false)?;
            }
        }
        for (layer_index, layer) in dto.layers.iter().enumerate() {
            for (index, link) in layer.links.iter().enumerate() {
                if !link.up {
                    design.set_link_state(link_ids[layer_index][index], false)?;
                }
            }
        }

        consistency::check(&design)?;
        Ok(design)
    }

    /// Copies the whole design into a snapshot DTO (atomic copy-on-read;
    /// no partial streaming).
    pub fn to_dto(&self) -> DesignDto {
        let node_index: BTreeMap<NodeId, usize> =
            self.node_order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let resource_index: BTreeMap<ResourceId, usize> =
            self.resource_order.iter().enumerate().map(|(i, r)| (*r, i)).collect();

        let nodes = self
            .node_order
            .iter()
            .map(|id| {
                let node = &self.nodes[*id];
                NodeDto {
                    name: node.name.clone(),
                    x: node.x,
                    y: node.y,
                    up: node.up,
                    attributes: node.attributes.clone(),
                }
            })
            .collect();

        let resources = self
            .resource_order
            .iter()
            .map(|id| {
                let resource = &self.resources[*id];
                ResourceDto {
                    node: node_index[&resource.host],
                    type_name: resource.type_name.clone(),
                    name: resource.name.clone(),
                    capacity: resource.capacity,
                    capacity_unit: resource.capacity_unit.clone(),
                    processing_time_ms: resource.processing_time_ms,
                    base_consumption: resource
                        .consumes_from_base
                        .iter()
                        .map(|(base, consumed)| BaseConsumptionDto {
                            resource: resource_index[base],
                            consumed: *consumed,
                        })
                        .collect(),
                    attributes: resource.attributes.clone(),
                }
            })
            .collect();

        let mut layers = Vec::with_capacity(self.layer_order.len());
        for layer_id in &self.layer_order {
            let layer = &self.layers[*layer_id];
            let link_pos: BTreeMap<LinkId, usize> =
                layer.links.iter().enumerate().map(|(i, l)| (*l, i)).collect();
            let demand_pos: BTreeMap<DemandId, usize> =
                layer.demands.iter().enumerate().map(|(i, d)| (*d, i)).collect();
            let mcast_pos: BTreeMap<MulticastDemandId, usize> =
                layer.multicast_demands.iter().enumerate().map(|(i, m)| (*m, i)).collect();
            let route_pos: BTreeMap<RouteId, usize> =
                layer.routes.iter().enumerate().map(|(i, r)| (*r, i)).collect();

            layers.push(LayerDto {
                name: layer.name.clone(),
                description: layer.description.clone(),
                link_capacity_units: layer.link_capacity_units.clone(),
                demand_traffic_units: layer.demand_traffic_units.clone(),
                attributes: layer.attributes.clone(),
                links: layer
                    .links
                    .iter()
                    .map(|id| {
                        let link = &self.links[*id];
                        LinkDto {
                            origin: node_index[&link.origin],
                            destination: node_index[&link.destination],
                            capacity: link.capacity,
                            length_km: link.length_km,
                            propagation_speed_km_s: link.propagation_speed_km_s,
                            up: link.up,
                            attributes: link.attributes.clone(),
                        }
                    })
                    .collect(),
                demands: layer
                    .demands
                    .iter()
                    .map(|id| {
                        let demand = &self.demands[*id];
                        DemandDto {
                            ingress: node_index[&demand.ingress],
                            egress: node_index[&demand.egress],
                            offered_traffic: demand.offered_traffic,
                            routing_type: match demand.routing_type {
                                RoutingType::SourceRouting => ROUTING_SOURCE.to_string(),
                                RoutingType::HopByHop => ROUTING_HOP_BY_HOP.to_string(),
                            },
                            service_chain: demand.service_chain.clone(),
                            forwarding_rules: demand
                                .forwarding_rules
                                .iter()
                                .map(|(link, ratio)| ForwardingRuleDto {
                                    link: link_pos[link],
                                    splitting_ratio: *ratio,
                                })
                                .collect(),
                            attributes: demand.attributes.clone(),
                        }
                    })
                    .collect(),
                multicast_demands: layer
                    .multicast_demands
                    .iter()
                    .map(|id| {
                        let mcast = &self.multicast_demands[*id];
                        MulticastDemandDto {
                            ingress: node_index[&mcast.ingress],
                            egress_nodes: mcast.egress_nodes.iter().map(|n| node_index[n]).collect(),
                            offered_traffic: mcast.offered_traffic,
                            attributes: mcast.attributes.clone(),
                        }
                    })
                    .collect(),
                routes: layer
                    .routes
                    .iter()
                    .map(|id| {
                        let route = &self.routes[*id];
                        RouteDto {
                            demand: demand_pos[&route.demand],
                            carried_traffic: route.carried_traffic,
                            path: route
                                .path
                                .iter()
                                .map(|element| match element {
                                    PathElement::Link(l) => PathElementDto::Link { index: link_pos[l] },
                                    PathElement::Resource(r) => {
                                        PathElementDto::Resource { index: resource_index[r] }
                                    }
                                })
                                .collect(),
                            occupation: route.occupation.clone(),
                            backups: route.backups.iter().map(|b| route_pos[b]).collect(),
                        }
                    })
                    .collect(),
                trees: layer
                    .trees
                    .iter()
                    .map(|id| {
                        let tree = &self.trees[*id];
                        MulticastTreeDto {
                            demand: mcast_pos[&tree.demand],
                            carried_traffic: tree.carried_traffic,
                            occupied_capacity: tree.occupied_capacity,
                            links: tree.links.iter().map(|l| link_pos[l]).collect(),
                        }
                    })
                    .collect(),
            });
        }

        let srgs = self
            .srg_order
            .iter()
            .map(|id| {
                let srg = &self.srgs[*id];
                SrgDto {
                    mean_time_to_fail_hours: srg.mean_time_to_fail_hours,
                    mean_time_to_repair_hours: srg.mean_time_to_repair_hours,
                    up: srg.up,
                    nodes: srg.nodes.iter().map(|n| node_index[n]).collect(),
                    links: srg
                        .links
                        .iter()
                        .map(|l| {
                            let layer = self.links[*l].layer;
                            LinkRefDto {
                                layer: self.layer_index(layer).expect("links live in listed layers"),
                                link: self.link_index(*l).expect("links are listed in their layer"),
                            }
                        })
                        .collect(),
                    attributes: srg.attributes.clone(),
                }
            })
            .collect();

        let couplings = self
            .coupling_pairs()
            .into_iter()
            .map(|(demand, link)| CouplingDto {
                demand_layer: self.layer_index(self.demands[demand].layer).expect("demand layers are listed"),
                demand: self.demand_index(demand).expect("demands are listed in their layer"),
                link_layer: self.layer_index(self.links[link].layer).expect("link layers are listed"),
                link: self.link_index(link).expect("links are listed in their layer"),
            })
            .collect();

        DesignDto {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            nodes,
            resources,
            layers,
            srgs,
            couplings,
            default_layer: self.layer_index(self.default_layer).expect("the default layer is listed"),
        }
    }
}
