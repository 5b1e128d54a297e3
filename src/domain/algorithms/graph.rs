use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::domain::design::NetworkDesign;
use crate::domain::ids::{LayerId, LinkId, NodeId};
use crate::error::{Error, Result};

/// The two stock link weight functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMetric {
    /// Every link weighs one.
    Hops,
    /// Every link weighs its length in km.
    Length,
}

/// Per-link weights driving the path searches. Must cover every link the
/// graph view includes and be non-negative.
pub type LinkCostMap = BTreeMap<LinkId, f64>;

/// Builds the cost map of one layer for a stock metric.
pub fn default_link_costs(design: &NetworkDesign, layer: LayerId, metric: CostMetric) -> Result<LinkCostMap> {
    let layer_ref = design
        .layer(layer)
        .ok_or_else(|| Error::ReferentialIntegrity(format!("unknown layer {:?}", layer)))?;
    let mut costs = LinkCostMap::new();
    for link in layer_ref.links() {
        let link_ref = design.link(*link).expect("layer lists only existing links");
        let cost = match metric {
            CostMetric::Hops => 1.0,
            CostMetric::Length => link_ref.length_km(),
        };
        costs.insert(*link, cost);
    }
    Ok(costs)
}

/// Attributes of one edge of the search graph.
#[derive(Debug, Clone)]
pub(crate) struct LayerEdge {
    pub link: LinkId,
    pub cost: f64,
    pub length_km: f64,
    pub delay_ms: f64,
    /// Stable tie-break key: lower uid wins on equal cost.
    pub uid: u64,
}

/// An immutable petgraph view of one layer, built for a cost vector.
///
/// By default only effectively-up nodes and links enter the view, so path
/// searches respect the current failure state; what-if callers can opt
/// into the full topology.
pub struct LayerGraph {
    pub(crate) graph: DiGraph<NodeId, LayerEdge>,
    pub(crate) index_of: BTreeMap<NodeId, NodeIndex>,
    pub(crate) endpoints: BTreeMap<LinkId, (NodeId, NodeId)>,
    pub(crate) edge_info: BTreeMap<LinkId, (f64, f64, f64, u64)>,
}

impl LayerGraph {
    /// Builds the view over the layer's up elements.
    pub fn build(design: &NetworkDesign, layer: LayerId, costs: &LinkCostMap) -> Result<Self> {
        Self::build_with_failures(design, layer, costs, false)
    }

    /// Builds the view; with `include_down` the failure state is ignored.
    pub fn build_with_failures(
        design: &NetworkDesign,
        layer: LayerId,
        costs: &LinkCostMap,
        include_down: bool,
    ) -> Result<Self> {
        let layer_ref = design
            .layer(layer)
            .ok_or_else(|| Error::ReferentialIntegrity(format!("unknown layer {:?}", layer)))?;

        let mut graph: DiGraph<NodeId, LayerEdge> = DiGraph::new();
        let mut index_of: BTreeMap<NodeId, NodeIndex> = BTreeMap::new();
        for node in design.node_ids() {
            if !include_down && !design.node_is_up(*node) {
                continue;
            }
            let index = graph.add_node(*node);
            index_of.insert(*node, index);
        }

        let mut endpoints = BTreeMap::new();
        let mut edge_info = BTreeMap::new();
        for link in layer_ref.links() {
            if !include_down && !design.link_is_up(*link) {
                continue;
            }
            let link_ref = design.link(*link).expect("layer lists only existing links");
            let cost = *costs.get(link).ok_or_else(|| {
                Error::InvariantViolation(format!("link cost map misses link {:?}", link))
            })?;
            if cost < 0.0 || !cost.is_finite() {
                return Err(Error::InvariantViolation(format!(
                    "link cost for {:?} must be finite and non-negative, got {}",
                    link, cost
                )));
            }
            let (Some(origin), Some(destination)) =
                (index_of.get(&link_ref.origin()), index_of.get(&link_ref.destination()))
            else {
                continue;
            };
            let edge = LayerEdge {
                link: *link,
                cost,
                length_km: link_ref.length_km(),
                delay_ms: link_ref.propagation_delay_ms(),
                uid: link_ref.uid(),
            };
            endpoints.insert(*link, (link_ref.origin(), link_ref.destination()));
            edge_info.insert(*link, (cost, edge.length_km, edge.delay_ms, edge.uid));
            graph.add_edge(*origin, *destination, edge);
        }

        Ok(Self { graph, index_of, endpoints, edge_info })
    }

    pub(crate) fn node_index(&self, node: NodeId) -> Option<NodeIndex> {
        self.index_of.get(&node).copied()
    }

    pub(crate) fn link_cost(&self, link: LinkId) -> f64 {
        self.edge_info.get(&link).map(|(c, _, _, _)| *c).unwrap_or(f64::INFINITY)
    }

    pub(crate) fn link_uid(&self, link: LinkId) -> u64 {
        self.edge_info.get(&link).map(|(_, _, _, u)| *u).unwrap_or(u64::MAX)
    }

    /// Node sequence of a connected link sequence starting at `from`.
    pub(crate) fn node_sequence(&self, from: NodeId, links: &[LinkId]) -> Vec<NodeId> {
        let mut nodes = vec![from];
        for link in links {
            if let Some((_, destination)) = self.endpoints.get(link) {
                nodes.push(*destination);
            }
        }
        nodes
    }
}
