use slotmap::new_key_type;
use std::collections::BTreeMap;

new_key_type! {
    pub struct LayerId;
    pub struct NodeId;
    pub struct LinkId;
    pub struct DemandId;
    pub struct MulticastDemandId;
    pub struct RouteId;
    pub struct MulticastTreeId;
    pub struct ResourceId;
    pub struct SrgId;
}

/// Free-form per-entity attributes, kept ordered so snapshots and reports
/// are reproducible.
pub type AttributeMap = BTreeMap<String, String>;
