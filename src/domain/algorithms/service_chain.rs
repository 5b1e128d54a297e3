use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::domain::EPS;
use crate::domain::algorithms::graph::LayerGraph;
use crate::domain::design::NetworkDesign;
use crate::domain::element::PathElement;
use crate::domain::ids::{LinkId, NodeId, ResourceId};
use crate::error::{Error, Result};

/// Sentinel cost marking elements of a primary chain during the disjoint
/// search: any result reaching it is reported infeasible.
const UNREACHABLE_COST: f64 = 1e15;

/// Admissibility limits every stitched sub-path must satisfy. A candidate
/// violating any limit is excluded before cost comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainLimits {
    pub max_length_km: Option<f64>,
    pub max_num_hops: Option<usize>,
    pub max_delay_ms: Option<f64>,
}

/// A computed service chain: the element walk and its total cost.
#[derive(Debug, Clone)]
pub struct ServiceChain {
    pub elements: Vec<PathElement>,
    pub cost: f64,
}

impl ServiceChain {
    pub fn links(&self) -> Vec<LinkId> {
        self.elements.iter().filter_map(PathElement::as_link).collect()
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        self.elements.iter().filter_map(PathElement::as_resource).collect()
    }
}

/// Minimum-cost walk from `ingress` to `egress` traversing, in order, one
/// resource of each type in `chain_types`, chosen among the resources of
/// that type system-wide.
///
/// Consecutive anchors are stitched by minimum-cost sub-paths satisfying
/// `limits`; the result is the globally cheapest valid composition over
/// the resource instances. `type_costs` adds a per-traversal cost for a
/// resource type (missing types cost nothing).
pub fn minimum_cost_service_chain(
    design: &NetworkDesign,
    graph: &LayerGraph,
    ingress: NodeId,
    egress: NodeId,
    chain_types: &[String],
    type_costs: &BTreeMap<String, f64>,
    limits: &ChainLimits,
) -> Result<ServiceChain> {
    chain_search(design, graph, ingress, egress, chain_types, type_costs, limits, &BTreeSet::new(), &BTreeSet::new())
}

/// Minimum-cost service chain sharing neither links nor resources with
/// `primary`, found by pricing the primary's elements at an unreachable
/// sentinel cost and re-running the search. Infeasible when every valid
/// chain still touches a primary element.
pub fn disjoint_service_chain(
    design: &NetworkDesign,
    graph: &LayerGraph,
    ingress: NodeId,
    egress: NodeId,
    chain_types: &[String],
    type_costs: &BTreeMap<String, f64>,
    limits: &ChainLimits,
    primary: &ServiceChain,
) -> Result<ServiceChain> {
    let masked_links: BTreeSet<LinkId> = primary.links().into_iter().collect();
    let masked_resources: BTreeSet<ResourceId> = primary.resources().into_iter().collect();
    let chain = chain_search(
        design,
        graph,
        ingress,
        egress,
        chain_types,
        type_costs,
        limits,
        &masked_links,
        &masked_resources,
    )?;
    if chain.cost >= UNREACHABLE_COST {
        return Err(Error::Infeasible(
            "every admissible chain shares a link or resource with the primary chain".to_string(),
        ));
    }
    Ok(chain)
}

/// One stage-candidate of the dynamic composition.
#[derive(Debug, Clone)]
struct Candidate {
    node: NodeId,
    resource: Option<ResourceId>,
    cost: f64,
    predecessor: Option<usize>,
    links_from_previous: Vec<LinkId>,
}

#[allow(clippy::too_many_arguments)]
fn chain_search(
    design: &NetworkDesign,
    graph: &LayerGraph,
    ingress: NodeId,
    egress: NodeId,
    chain_types: &[String],
    type_costs: &BTreeMap<String, f64>,
    limits: &ChainLimits,
    masked_links: &BTreeSet<LinkId>,
    masked_resources: &BTreeSet<ResourceId>,
) -> Result<ServiceChain> {
    if graph.node_index(ingress).is_none() || graph.node_index(egress).is_none() {
        return Err(Error::ReferentialIntegrity(
            "service-chain endpoints are not part of the layer graph".to_string(),
        ));
    }

    let mut subpath_cache: BTreeMap<(NodeId, NodeId), Option<(Vec<LinkId>, f64)>> = BTreeMap::new();
    let mut subpath = |from: NodeId, to: NodeId| -> Option<(Vec<LinkId>, f64)> {
        subpath_cache
            .entry((from, to))
            .or_insert_with(|| constrained_shortest_path(graph, from, to, limits, masked_links))
            .clone()
    };

    let mut stages: Vec<Vec<Candidate>> = Vec::with_capacity(chain_types.len() + 2);
    stages.push(vec![Candidate {
        node: ingress,
        resource: None,
        cost: 0.0,
        predecessor: None,
        links_from_previous: Vec::new(),
    }]);

    for type_name in chain_types {
        let instances = design.resources_of_type(type_name);
        if instances.is_empty() {
            return Err(Error::Infeasible(format!("no resource of type '{}' exists", type_name)));
        }
        let type_cost = type_costs.get(type_name).copied().unwrap_or(0.0);

        let previous = stages.last().expect("stage zero is always present").clone();
        let mut stage: Vec<Candidate> = Vec::new();
        for resource_id in instances {
            let resource = design.resource(resource_id).expect("resource order lists existing resources");
            let host = resource.host();
            if graph.node_index(host).is_none() {
                // Host down or absent from the view.
                continue;
            }
            let mask_cost = if masked_resources.contains(&resource_id) { UNREACHABLE_COST } else { 0.0 };

            let mut best: Option<Candidate> = None;
            for (index, candidate) in previous.iter().enumerate() {
                let Some((links, path_cost)) = subpath(candidate.node, host) else {
                    continue;
                };
                let total = candidate.cost + path_cost + type_cost + mask_cost;
                let is_better = match &best {
                    Some(current) => total < current.cost - EPS,
                    None => true,
                };
                if is_better {
                    best = Some(Candidate {
                        node: host,
                        resource: Some(resource_id),
                        cost: total,
                        predecessor: Some(index),
                        links_from_previous: links,
                    });
                }
            }
            if let Some(best) = best {
                stage.push(best);
            }
        }
        if stage.is_empty() {
            return Err(Error::Infeasible(format!(
                "no admissible sub-path reaches any resource of type '{}'",
                type_name
            )));
        }
        stages.push(stage);
    }

    // Close the walk at the egress node.
    let previous = stages.last().expect("stage zero is always present").clone();
    let mut best_final: Option<Candidate> = None;
    for (index, candidate) in previous.iter().enumerate() {
        let Some((links, path_cost)) = subpath(candidate.node, egress) else {
            continue;
        };
        let total = candidate.cost + path_cost;
        let is_better = match &best_final {
            Some(current) => total < current.cost - EPS,
            None => true,
        };
        if is_better {
            best_final = Some(Candidate {
                node: egress,
                resource: None,
                cost: total,
                predecessor: Some(index),
                links_from_previous: links,
            });
        }
    }
    let Some(final_candidate) = best_final else {
        return Err(Error::Infeasible(
            "no admissible sub-path reaches the egress from the last chain resource".to_string(),
        ));
    };

    // Walk the predecessor chain backwards, stage by stage.
    let mut elements_reversed: Vec<PathElement> = Vec::new();
    let mut cursor = final_candidate.clone();
    let mut predecessor_stage = stages.len() - 1;
    loop {
        for link in cursor.links_from_previous.iter().rev() {
            elements_reversed.push(PathElement::Link(*link));
        }
        let Some(previous_index) = cursor.predecessor else {
            break;
        };
        cursor = stages[predecessor_stage][previous_index].clone();
        if let Some(resource) = cursor.resource {
            elements_reversed.push(PathElement::Resource(resource));
        }
        if predecessor_stage == 0 {
            break;
        }
        predecessor_stage -= 1;
    }
    elements_reversed.reverse();

    Ok(ServiceChain { elements: elements_reversed, cost: final_candidate.cost })
}

#[derive(Debug, Clone)]
struct Label {
    cost: f64,
    length_km: f64,
    delay_ms: f64,
    hops: usize,
    node: NodeIndex,
    predecessor: Option<(usize, LinkId)>,
}

#[derive(Debug, PartialEq)]
struct LabelEntry {
    cost: f64,
    index: usize,
}

impl Eq for LabelEntry {}

impl Ord for LabelEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for LabelEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Minimum-cost path satisfying the admissibility limits, by label-setting
/// search with dominance pruning over (cost, length, delay, hops).
///
/// Unlike plain Dijkstra this never discards a costlier label that is
/// shorter in a constrained dimension, so a feasible path is found
/// whenever one exists. Masked links stay usable at the sentinel price.
fn constrained_shortest_path(
    graph: &LayerGraph,
    from: NodeId,
    to: NodeId,
    limits: &ChainLimits,
    masked_links: &BTreeSet<LinkId>,
) -> Option<(Vec<LinkId>, f64)> {
    let source = graph.node_index(from)?;
    let target = graph.node_index(to)?;
    if from == to {
        return Some((Vec::new(), 0.0));
    }

    let mut labels: Vec<Label> = vec![Label {
        cost: 0.0,
        length_km: 0.0,
        delay_ms: 0.0,
        hops: 0,
        node: source,
        predecessor: None,
    }];
    let mut per_node: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    per_node.insert(source.index(), vec![0]);

    let mut heap = BinaryHeap::new();
    heap.push(LabelEntry { cost: 0.0, index: 0 });

    while let Some(LabelEntry { index, .. }) = heap.pop() {
        let label = labels[index].clone();
        if label.node == target {
            let mut links = Vec::new();
            let mut cursor = &labels[index];
            while let Some((previous, link)) = cursor.predecessor {
                links.push(link);
                cursor = &labels[previous];
            }
            links.reverse();
            return Some((links, label.cost));
        }

        let mut edges: Vec<(NodeIndex, LinkId, f64, f64, f64, u64)> = graph
            .graph
            .edges_directed(label.node, Direction::Outgoing)
            .map(|e| {
                let w = e.weight();
                (e.target(), w.link, w.cost, w.length_km, w.delay_ms, w.uid)
            })
            .collect();
        edges.sort_by_key(|(_, _, _, _, _, uid)| *uid);

        for (next, link, cost, length_km, delay_ms, _) in edges {
            let masked = if masked_links.contains(&link) { UNREACHABLE_COST } else { 0.0 };
            let extended = Label {
                cost: label.cost + cost + masked,
                length_km: label.length_km + length_km,
                delay_ms: label.delay_ms + delay_ms,
                hops: label.hops + 1,
                node: next,
                predecessor: Some((index, link)),
            };
            if let Some(max_length) = limits.max_length_km {
                if extended.length_km > max_length + EPS {
                    continue;
                }
            }
            if let Some(max_hops) = limits.max_num_hops {
                if extended.hops > max_hops {
                    continue;
                }
            }
            if let Some(max_delay) = limits.max_delay_ms {
                if extended.delay_ms > max_delay + EPS {
                    continue;
                }
            }

            let node_labels = per_node.entry(next.index()).or_default();
            let dominated = node_labels.iter().any(|other| {
                let other = &labels[*other];
                other.cost <= extended.cost + EPS
                    && other.length_km <= extended.length_km + EPS
                    && other.delay_ms <= extended.delay_ms + EPS
                    && other.hops <= extended.hops
            });
            if dominated {
                continue;
            }

            let new_index = labels.len();
            labels.push(extended);
            per_node.get_mut(&next.index()).expect("entry created above").push(new_index);
            heap.push(LabelEntry { cost: labels[new_index].cost, index: new_index });
        }
    }
    None
}
