use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use itertools::Itertools;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::domain::EPS;
use crate::domain::algorithms::graph::LayerGraph;
use crate::domain::ids::{LinkId, NodeId};
use crate::error::{Error, Result};

/// One path between two nodes: its link sequence and total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub links: Vec<LinkId>,
    pub cost: f64,
}

/// Minimum-cost path between two nodes, `None` when unreachable.
///
/// Deterministic: equal-cost alternatives resolve to the one entered over
/// the lower link uid.
pub fn shortest_path(graph: &LayerGraph, from: NodeId, to: NodeId) -> Option<PathResult> {
    shortest_path_filtered(graph, from, to, &BTreeSet::new(), &BTreeSet::new())
}

/// Up to `k` distinct simple paths in ascending cost order (Yen's
/// successive shortest paths with path exclusion). Fewer than `k` paths
/// exist when the graph runs out of alternatives.
pub fn k_shortest_paths(graph: &LayerGraph, from: NodeId, to: NodeId, k: usize) -> Vec<PathResult> {
    let mut found: Vec<PathResult> = Vec::new();
    if k == 0 {
        return found;
    }
    let Some(first) = shortest_path(graph, from, to) else {
        return found;
    };
    found.push(first);

    let mut candidates: Vec<PathResult> = Vec::new();
    let mut seen: BTreeSet<Vec<LinkId>> = BTreeSet::new();
    seen.insert(found[0].links.clone());

    while found.len() < k {
        let previous = found.last().expect("at least the first path is present").clone();
        let previous_nodes = graph.node_sequence(from, &previous.links);

        for spur_index in 0..previous.links.len() {
            let spur_node = previous_nodes[spur_index];
            let root: Vec<LinkId> = previous.links[..spur_index].to_vec();
            let root_cost: f64 = root.iter().map(|l| graph.link_cost(*l)).sum();

            // Each subsequent path must differ from every known path with
            // the same root in at least the next link.
            let mut banned_links: BTreeSet<LinkId> = BTreeSet::new();
            for path in found.iter() {
                if path.links.len() > spur_index && path.links[..spur_index] == root[..] {
                    banned_links.insert(path.links[spur_index]);
                }
            }
            // Root nodes (except the spur node itself) stay untouched so
            // the result remains a simple path.
            let banned_nodes: BTreeSet<NodeId> =
                previous_nodes[..spur_index].iter().copied().collect();

            let Some(spur) = shortest_path_filtered(graph, spur_node, to, &banned_links, &banned_nodes)
            else {
                continue;
            };

            let mut links = root;
            links.extend(spur.links);
            if seen.insert(links.clone()) {
                candidates.push(PathResult { cost: root_cost + spur.cost, links });
            }
        }

        if candidates.is_empty() {
            break;
        }
        let best = candidates
            .iter()
            .position_min_by(|a, b| compare_paths(graph, a, b))
            .expect("candidates not empty");
        found.push(candidates.swap_remove(best));
    }
    found
}

/// Two paths between a node pair sharing no link: the shortest path, then
/// the shortest path in the graph with the first path's links removed.
///
/// Infeasible (an explicit signal, not a partial result) when no second
/// link-disjoint path exists.
pub fn two_link_disjoint_paths(
    graph: &LayerGraph,
    from: NodeId,
    to: NodeId,
) -> Result<(PathResult, PathResult)> {
    let first = shortest_path(graph, from, to).ok_or_else(|| {
        Error::Infeasible(format!("no path between nodes {:?} and {:?}", from, to))
    })?;
    let banned: BTreeSet<LinkId> = first.links.iter().copied().collect();
    let second = shortest_path_filtered(graph, from, to, &banned, &BTreeSet::new()).ok_or_else(|| {
        Error::Infeasible(format!(
            "no second path between nodes {:?} and {:?} that is link-disjoint with the first",
            from, to
        ))
    })?;
    Ok((first, second))
}

/// Ascending by cost, ties by the lower link-uid sequence.
fn compare_paths(graph: &LayerGraph, a: &PathResult, b: &PathResult) -> Ordering {
    match a.cost.total_cmp(&b.cost) {
        Ordering::Equal => {
            let a_uids: Vec<u64> = a.links.iter().map(|l| graph.link_uid(*l)).collect();
            let b_uids: Vec<u64> = b.links.iter().map(|l| graph.link_uid(*l)).collect();
            a_uids.cmp(&b_uids)
        }
        other => other,
    }
}

#[derive(Debug, PartialEq)]
struct QueueEntry {
    cost: f64,
    node: NodeIndex,
}

impl Eq for QueueEntry {}

// Reversed: BinaryHeap is a max-heap, we pop the cheapest entry.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.index().cmp(&self.node.index()))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra over the layer view with link/node exclusion.
pub(crate) fn shortest_path_filtered(
    graph: &LayerGraph,
    from: NodeId,
    to: NodeId,
    banned_links: &BTreeSet<LinkId>,
    banned_nodes: &BTreeSet<NodeId>,
) -> Option<PathResult> {
    let source = graph.node_index(from)?;
    let target = graph.node_index(to)?;
    if from == to {
        return Some(PathResult { links: Vec::new(), cost: 0.0 });
    }

    let n = graph.graph.node_count();
    let mut dist: Vec<f64> = vec![f64::INFINITY; n];
    let mut pred: Vec<Option<(NodeIndex, LinkId, u64)>> = vec![None; n];
    let mut done: Vec<bool> = vec![false; n];

    dist[source.index()] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry { cost: 0.0, node: source });

    while let Some(QueueEntry { cost, node }) = heap.pop() {
        if done[node.index()] {
            continue;
        }
        done[node.index()] = true;
        if node == target {
            break;
        }

        // Deterministic relaxation order: by link uid.
        let mut edges: Vec<(NodeIndex, LinkId, f64, u64)> = graph
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), e.weight().link, e.weight().cost, e.weight().uid))
            .collect();
        edges.sort_by_key(|(_, _, _, uid)| *uid);

        for (next, link, link_cost, uid) in edges {
            if banned_links.contains(&link) {
                continue;
            }
            if banned_nodes.contains(&graph.graph[next]) {
                continue;
            }
            if done[next.index()] {
                continue;
            }
            let candidate = cost + link_cost;
            let current = dist[next.index()];
            if candidate < current - EPS {
                dist[next.index()] = candidate;
                pred[next.index()] = Some((node, link, uid));
                heap.push(QueueEntry { cost: candidate, node: next });
            } else if (candidate - current).abs() <= EPS {
                // Tie: keep the entry over the lower link uid.
                if let Some((_, _, old_uid)) = pred[next.index()] {
                    if uid < old_uid {
                        pred[next.index()] = Some((node, link, uid));
                    }
                }
            }
        }
    }

    if !dist[target.index()].is_finite() {
        return None;
    }

    let mut links = Vec::new();
    let mut cursor = target;
    while cursor != source {
        let (previous, link, _) = pred[cursor.index()]?;
        links.push(link);
        cursor = previous;
    }
    links.reverse();
    Some(PathResult { links, cost: dist[target.index()] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::algorithms::graph::{CostMetric, default_link_costs};
    use crate::domain::design::NetworkDesign;

    /// Square topology: nodes A, B, C, D with bidirectional links A-B,
    /// B-C, C-D, A-D, every link at cost 1.
    fn square_design() -> (NetworkDesign, Vec<NodeId>) {
        let mut design = NetworkDesign::new("square");
        let layer = design.default_layer();
        let a = design.add_node("A", 0.0, 0.0);
        let b = design.add_node("B", 1.0, 0.0);
        let c = design.add_node("C", 1.0, 1.0);
        let d = design.add_node("D", 0.0, 1.0);
        for (u, v) in [(a, b), (b, c), (c, d), (a, d)] {
            design.add_link(layer, u, v, 10.0, 1.0, 200_000.0).unwrap();
            design.add_link(layer, v, u, 10.0, 1.0, 200_000.0).unwrap();
        }
        (design, vec![a, b, c, d])
    }

    #[test]
    fn shortest_path_prefers_the_direct_link() {
        let (design, nodes) = square_design();
        let costs = default_link_costs(&design, design.default_layer(), CostMetric::Hops).unwrap();
        let graph = LayerGraph::build(&design, design.default_layer(), &costs).unwrap();

        let path = shortest_path(&graph, nodes[0], nodes[3]).expect("A and D are connected");
        assert_eq!(path.links.len(), 1);
        assert_eq!(path.cost, 1.0);
    }

    #[test]
    fn k_shortest_returns_cost_ordered_distinct_paths() {
        let (design, nodes) = square_design();
        let costs = default_link_costs(&design, design.default_layer(), CostMetric::Hops).unwrap();
        let graph = LayerGraph::build(&design, design.default_layer(), &costs).unwrap();

        let paths = k_shortest_paths(&graph, nodes[0], nodes[3], 2);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].links.len(), 1, "first path is A-D");
        assert_eq!(paths[1].links.len(), 3, "second path is A-B, B-C, C-D");
        assert!(paths[0].cost <= paths[1].cost);
    }

    #[test]
    fn k_shortest_never_invents_paths() {
        // Two simple paths exist between A and D; asking for three still
        // yields exactly two, without duplicates.
        let (design, nodes) = square_design();
        let costs = default_link_costs(&design, design.default_layer(), CostMetric::Hops).unwrap();
        let graph = LayerGraph::build(&design, design.default_layer(), &costs).unwrap();

        let paths = k_shortest_paths(&graph, nodes[0], nodes[3], 3);
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0].links, paths[1].links);
    }

    #[test]
    fn disjoint_pair_on_the_square() {
        let (design, nodes) = square_design();
        let costs = default_link_costs(&design, design.default_layer(), CostMetric::Hops).unwrap();
        let graph = LayerGraph::build(&design, design.default_layer(), &costs).unwrap();

        let (first, second) = two_link_disjoint_paths(&graph, nodes[0], nodes[2]).unwrap();
        let first_set: BTreeSet<LinkId> = first.links.iter().copied().collect();
        assert!(second.links.iter().all(|l| !first_set.contains(l)));
    }

    #[test]
    fn disjoint_pair_reports_infeasible_when_paths_must_share_a_link() {
        // A -> M is a bridge: both A->M->B "paths" share it.
        let mut design = NetworkDesign::new("bridge");
        let layer = design.default_layer();
        let a = design.add_node("A", 0.0, 0.0);
        let m = design.add_node("M", 1.0, 0.0);
        let b = design.add_node("B", 2.0, 0.0);
        design.add_link(layer, a, m, 10.0, 1.0, 200_000.0).unwrap();
        design.add_link(layer, m, b, 10.0, 1.0, 200_000.0).unwrap();

        let costs = default_link_costs(&design, layer, CostMetric::Hops).unwrap();
        let graph = LayerGraph::build(&design, layer, &costs).unwrap();
        let result = two_link_disjoint_paths(&graph, a, b);
        assert!(matches!(result, Err(Error::Infeasible(_))));
    }
}
