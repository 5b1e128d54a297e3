use std::collections::BTreeMap;

use petgraph::Direction;
use petgraph::visit::EdgeRef;

use crate::domain::algorithms::graph::{LayerGraph, LinkCostMap};
use crate::domain::design::NetworkDesign;
use crate::domain::ids::{DemandId, LinkId, NodeId};
use crate::error::{Error, Result};

/// Convergence tolerance of the flow-conservation sweep.
const FLOW_EPS: f64 = 1e-9;

/// Resolved hop-by-hop flows of one demand.
#[derive(Debug, Clone, Default)]
pub(crate) struct DemandFlows {
    /// Traffic of the demand on each link with an active rule.
    pub link_traffic: BTreeMap<LinkId, f64>,
    /// Traffic reaching the egress node.
    pub delivered: f64,
}

/// Solves the flow-conservation equations of one hop-by-hop demand under
/// the current failure state: traffic present at a node splits over its
/// outgoing rules, the egress absorbs, rules over down links are inactive
/// (their traffic becomes blocked, never silently dropped elsewhere).
///
/// The sweep iterates to a fixpoint; a closed routing loop that keeps
/// accumulating traffic never stabilizes and is reported as
/// `Error::NonConvergence` instead of looping forever.
pub(crate) fn resolve_demand_flows(design: &NetworkDesign, demand: DemandId) -> Result<DemandFlows> {
    let demand_ref = design
        .demand(demand)
        .ok_or_else(|| Error::ReferentialIntegrity(format!("unknown demand {:?}", demand)))?;
    let ingress = demand_ref.ingress();
    let egress = demand_ref.egress();
    let offered = demand_ref.offered_traffic();

    if !design.node_is_up(ingress) || !design.node_is_up(egress) || offered <= 0.0 {
        return Ok(DemandFlows::default());
    }

    // Active rules: up links only, and no forwarding out of the egress.
    let rules: Vec<(LinkId, NodeId, NodeId, f64)> = demand_ref
        .forwarding_rules()
        .iter()
        .filter(|(link, _)| design.link_is_up(**link))
        .map(|(link, ratio)| {
            let link_ref = design.link(*link).expect("rules reference existing links");
            (*link, link_ref.origin(), link_ref.destination(), *ratio)
        })
        .filter(|(_, origin, _, _)| *origin != egress)
        .collect();

    if rules.is_empty() {
        return Ok(DemandFlows::default());
    }

    let max_sweeps = 100 + 10 * design.node_ids().len();
    let mut node_traffic: BTreeMap<NodeId, f64> = BTreeMap::new();
    node_traffic.insert(ingress, offered);

    for _ in 0..max_sweeps {
        let mut next: BTreeMap<NodeId, f64> = BTreeMap::new();
        next.insert(ingress, offered);
        for (_, origin, destination, ratio) in &rules {
            let at_origin = node_traffic.get(origin).copied().unwrap_or(0.0);
            if at_origin <= 0.0 {
                continue;
            }
            *next.entry(*destination).or_insert(0.0) += at_origin * ratio;
        }

        let mut residual: f64 = 0.0;
        for (node, traffic) in &next {
            let previous = node_traffic.get(node).copied().unwrap_or(0.0);
            residual = residual.max((traffic - previous).abs());
        }
        for (node, traffic) in &node_traffic {
            if !next.contains_key(node) {
                residual = residual.max(*traffic);
            }
        }

        node_traffic = next;
        if residual <= FLOW_EPS {
            let mut flows = DemandFlows::default();
            for (link, origin, _, ratio) in &rules {
                let at_origin = node_traffic.get(origin).copied().unwrap_or(0.0);
                let traffic = at_origin * ratio;
                if traffic > FLOW_EPS {
                    flows.link_traffic.insert(*link, traffic);
                }
            }
            flows.delivered = node_traffic.get(&egress).copied().unwrap_or(0.0).min(offered);
            return Ok(flows);
        }
    }

    Err(Error::NonConvergence(format!(
        "forwarding rules of demand {:?} form a closed loop; no stable flow after {} sweeps",
        demand, max_sweeps
    )))
}

/// ECMP-from-weights rule generation: at every node on a shortest path
/// toward the demand's egress, split equally over the outgoing links that
/// stay on some shortest path.
///
/// Returns the rules; apply them with
/// `NetworkDesign::set_forwarding_rules`.
pub fn ecmp_forwarding_rules(
    design: &NetworkDesign,
    graph: &LayerGraph,
    demand: DemandId,
    costs: &LinkCostMap,
) -> Result<Vec<(LinkId, f64)>> {
    let demand_ref = design
        .demand(demand)
        .ok_or_else(|| Error::ReferentialIntegrity(format!("unknown demand {:?}", demand)))?;
    let egress = demand_ref.egress();

    let distance = distances_to(graph, egress).ok_or_else(|| {
        Error::ReferentialIntegrity(format!("demand egress {:?} is not part of the layer graph", egress))
    })?;

    let layer = design.layer(demand_ref.layer()).expect("demand layers exist");
    let mut rules: Vec<(LinkId, f64)> = Vec::new();
    let mut per_node: BTreeMap<NodeId, Vec<LinkId>> = BTreeMap::new();
    for link in layer.links() {
        // Only links present in the (failure-aware) graph view qualify.
        if !graph.edge_info.contains_key(link) {
            continue;
        }
        let Some(cost) = costs.get(link) else {
            continue;
        };
        let link_ref = design.link(*link).expect("layer lists only existing links");
        let (Some(from_origin), Some(from_destination)) =
            (distance.get(&link_ref.origin()), distance.get(&link_ref.destination()))
        else {
            continue;
        };
        if link_ref.origin() == egress {
            continue;
        }
        // On a shortest path: d(origin) = cost(link) + d(destination).
        if (from_origin - (cost + from_destination)).abs() <= FLOW_EPS {
            per_node.entry(link_ref.origin()).or_default().push(*link);
        }
    }
    for (_, links) in per_node {
        let ratio = 1.0 / links.len() as f64;
        for link in links {
            rules.push((link, ratio));
        }
    }
    rules.sort_by_key(|(link, _)| graph.link_uid(*link));
    Ok(rules)
}

/// Minimum cost from every node toward `target` (Dijkstra over reversed
/// edges). `None` when the target is not in the graph.
fn distances_to(graph: &LayerGraph, target: NodeId) -> Option<BTreeMap<NodeId, f64>> {
    use std::cmp::Ordering;
    use std::collections::BinaryHeap;

    #[derive(PartialEq)]
    struct Entry {
        cost: f64,
        node: petgraph::graph::NodeIndex,
    }
    impl Eq for Entry {}
    impl Ord for Entry {
        fn cmp(&self, other: &Self) -> Ordering {
            other
                .cost
                .total_cmp(&self.cost)
                .then_with(|| other.node.index().cmp(&self.node.index()))
        }
    }
    impl PartialOrd for Entry {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    let target_index = graph.node_index(target)?;
    let mut dist: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut done = vec![false; graph.graph.node_count()];
    let mut heap = BinaryHeap::new();
    dist.insert(target, 0.0);
    heap.push(Entry { cost: 0.0, node: target_index });

    while let Some(Entry { cost, node }) = heap.pop() {
        if done[node.index()] {
            continue;
        }
        done[node.index()] = true;
        for edge in graph.graph.edges_directed(node, Direction::Incoming) {
            let previous = edge.source();
            if done[previous.index()] {
                continue;
            }
            let candidate = cost + edge.weight().cost;
            let node_id = graph.graph[previous];
            let current = dist.get(&node_id).copied().unwrap_or(f64::INFINITY);
            if candidate < current {
                dist.insert(node_id, candidate);
                heap.push(Entry { cost: candidate, node: previous });
            }
        }
    }
    Some(dist)
}
