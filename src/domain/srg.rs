use crate::domain::ids::{AttributeMap, LinkId, NodeId};

/// A set of nodes and links (any layer) whose simultaneous failure is
/// modeled as one event.
///
/// Setting the SRG down takes all members down atomically; setting it up
/// restores exactly the members not independently down for another reason.
/// Both follow from the effective-state rule: an element is up iff its own
/// planned flag is up and no SRG containing it is down.
#[derive(Debug, Clone)]
pub struct SharedRiskGroup {
    pub(crate) uid: u64,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) links: Vec<LinkId>,

    pub(crate) mean_time_to_fail_hours: f64,
    pub(crate) mean_time_to_repair_hours: f64,

    pub(crate) up: bool,

    pub(crate) attributes: AttributeMap,
}

impl SharedRiskGroup {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn mean_time_to_fail_hours(&self) -> f64 {
        self.mean_time_to_fail_hours
    }

    pub fn mean_time_to_repair_hours(&self) -> f64 {
        self.mean_time_to_repair_hours
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Steady-state availability from the MTTF/MTTR attributes.
    pub fn availability(&self) -> f64 {
        let total = self.mean_time_to_fail_hours + self.mean_time_to_repair_hours;
        if total <= 0.0 {
            return 1.0;
        }
        self.mean_time_to_fail_hours / total
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_link(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }
}
