use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whole-design snapshot, the unit the external persistence collaborator
/// reads and writes atomically.
///
/// Entities reference each other by position: nodes and resources by
/// their index in the top-level vectors, links/demands/routes by their
/// index within their layer. Positions are stable in a snapshot, so a
/// round trip survives any slotmap key renumbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignDto {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub resources: Vec<ResourceDto>,
    pub layers: Vec<LayerDto>,
    #[serde(default)]
    pub srgs: Vec<SrgDto>,
    #[serde(default)]
    pub couplings: Vec<CouplingDto>,
    pub default_layer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDto {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_true")]
    pub up: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Base resources are consumed by index; a snapshot always lists a base
/// before the resources consuming from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDto {
    pub node: usize,
    pub type_name: String,
    pub name: String,
    pub capacity: f64,
    #[serde(default)]
    pub capacity_unit: String,
    #[serde(default)]
    pub processing_time_ms: f64,
    #[serde(default)]
    pub base_consumption: Vec<BaseConsumptionDto>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConsumptionDto {
    pub resource: usize,
    pub consumed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link_capacity_units: String,
    #[serde(default)]
    pub demand_traffic_units: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
    #[serde(default)]
    pub demands: Vec<DemandDto>,
    #[serde(default)]
    pub multicast_demands: Vec<MulticastDemandDto>,
    #[serde(default)]
    pub routes: Vec<RouteDto>,
    #[serde(default)]
    pub trees: Vec<MulticastTreeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDto {
    pub origin: usize,
    pub destination: usize,
    pub capacity: f64,
    #[serde(default)]
    pub length_km: f64,
    #[serde(default)]
    pub propagation_speed_km_s: f64,
    #[serde(default = "default_true")]
    pub up: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandDto {
    pub ingress: usize,
    pub egress: usize,
    pub offered_traffic: f64,
    /// `SOURCE_ROUTING` or `HOP_BY_HOP`.
    pub routing_type: String,
    #[serde(default)]
    pub service_chain: Vec<String>,
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRuleDto>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingRuleDto {
    /// Link index within the same layer.
    pub link: usize,
    pub splitting_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastDemandDto {
    pub ingress: usize,
    pub egress_nodes: Vec<usize>,
    pub offered_traffic: f64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDto {
    /// Demand index within the same layer.
    pub demand: usize,
    pub carried_traffic: f64,
    pub path: Vec<PathElementDto>,
    pub occupation: Vec<f64>,
    /// Indices of backup routes, within the same layer's route list.
    #[serde(default)]
    pub backups: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathElementDto {
    /// Link index within the route's layer.
    Link { index: usize },
    /// Resource index in the top-level resource list.
    Resource { index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastTreeDto {
    /// Multicast demand index within the same layer.
    pub demand: usize,
    pub carried_traffic: f64,
    pub occupied_capacity: f64,
    /// Link indices within the same layer.
    pub links: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrgDto {
    pub mean_time_to_fail_hours: f64,
    pub mean_time_to_repair_hours: f64,
    #[serde(default = "default_true")]
    pub up: bool,
    #[serde(default)]
    pub nodes: Vec<usize>,
    #[serde(default)]
    pub links: Vec<LinkRefDto>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A link addressed across layers: (layer index, link index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRefDto {
    pub layer: usize,
    pub link: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingDto {
    /// The lower-layer demand: (layer index, demand index).
    pub demand_layer: usize,
    pub demand: usize,
    /// The upper-layer link it realizes: (layer index, link index).
    pub link_layer: usize,
    pub link: usize,
}

fn default_true() -> bool {
    true
}
