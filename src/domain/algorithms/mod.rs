pub mod graph;
pub mod paths;
pub mod service_chain;

pub use graph::{CostMetric, LayerGraph, LinkCostMap, default_link_costs};
pub use paths::{PathResult, k_shortest_paths, shortest_path, two_link_disjoint_paths};
pub use service_chain::{ChainLimits, ServiceChain, disjoint_service_chain, minimum_cost_service_chain};
