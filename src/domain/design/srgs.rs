use crate::domain::design::NetworkDesign;
use crate::domain::ids::{AttributeMap, LinkId, NodeId, SrgId};
use crate::domain::srg::SharedRiskGroup;
use crate::error::{Error, Result};

impl NetworkDesign {
    //-----------------
    // --- SRG ops ---
    //-----------------

    pub fn add_srg(
        &mut self,
        mean_time_to_fail_hours: f64,
        mean_time_to_repair_hours: f64,
    ) -> Result<SrgId> {
        if mean_time_to_fail_hours < 0.0 || mean_time_to_repair_hours < 0.0 {
            return Err(Error::InvariantViolation("SRG MTTF/MTTR must be non-negative".to_string()));
        }
        let uid = self.next_uid();
        let srg = self.srgs.insert(SharedRiskGroup {
            uid,
            nodes: Vec::new(),
            links: Vec::new(),
            mean_time_to_fail_hours,
            mean_time_to_repair_hours,
            up: true,
            attributes: AttributeMap::new(),
        });
        self.srg_order.push(srg);
        Ok(srg)
    }

    pub fn remove_srg(&mut self, srg: SrgId) -> Result<()> {
        self.srg_ref(srg)?;
        self.transactional(|design| {
            let nodes = design.srgs[srg].nodes.clone();
            for node in nodes {
                design.nodes[node].srgs.retain(|s| *s != srg);
            }
            let links = design.srgs[srg].links.clone();
            for link in links {
                design.links[link].srgs.retain(|s| *s != srg);
            }
            design.srg_order.retain(|s| *s != srg);
            design.srgs.remove(srg);
            design.refresh_traffic_state()
        })
    }

    pub fn add_node_to_srg(&mut self, srg: SrgId, node: NodeId) -> Result<()> {
        let srg_ref = self.srg_ref(srg)?;
        self.node_ref(node)?;
        if srg_ref.nodes.contains(&node) {
            return Err(Error::InvariantViolation(format!("node {:?} is already a member of SRG {:?}", node, srg)));
        }
        self.transactional(|design| {
            design.srgs[srg].nodes.push(node);
            design.nodes[node].srgs.push(srg);
            design.refresh_traffic_state()
        })
    }

    pub fn add_link_to_srg(&mut self, srg: SrgId, link: LinkId) -> Result<()> {
        let srg_ref = self.srg_ref(srg)?;
        self.link_ref(link)?;
        if srg_ref.links.contains(&link) {
            return Err(Error::InvariantViolation(format!("link {:?} is already a member of SRG {:?}", link, srg)));
        }
        self.transactional(|design| {
            design.srgs[srg].links.push(link);
            design.links[link].srgs.push(srg);
            design.refresh_traffic_state()
        })
    }

    pub fn remove_node_from_srg(&mut self, srg: SrgId, node: NodeId) -> Result<()> {
        let srg_ref = self.srg_ref(srg)?;
        if !srg_ref.nodes.contains(&node) {
            return Err(Error::ReferentialIntegrity(format!("node {:?} is not a member of SRG {:?}", node, srg)));
        }
        self.transactional(|design| {
            design.srgs[srg].nodes.retain(|n| *n != node);
            design.nodes[node].srgs.retain(|s| *s != srg);
            design.refresh_traffic_state()
        })
    }

    pub fn remove_link_from_srg(&mut self, srg: SrgId, link: LinkId) -> Result<()> {
        let srg_ref = self.srg_ref(srg)?;
        if !srg_ref.links.contains(&link) {
            return Err(Error::ReferentialIntegrity(format!("link {:?} is not a member of SRG {:?}", link, srg)));
        }
        self.transactional(|design| {
            design.srgs[srg].links.retain(|l| *l != link);
            design.links[link].srgs.retain(|s| *s != srg);
            design.refresh_traffic_state()
        })
    }

    /// Takes the whole SRG down or up. Member states follow atomically
    /// through the effective-state rule: members independently down for
    /// another reason stay down when the SRG comes back.
    pub fn set_srg_state(&mut self, srg: SrgId, up: bool) -> Result<()> {
        self.srg_ref(srg)?;
        self.transactional(|design| {
            design.srgs[srg].up = up;
            design.refresh_traffic_state()
        })
    }

    pub fn srg_attributes_mut(&mut self, srg: SrgId) -> Result<&mut AttributeMap> {
        self.srg_ref(srg)?;
        Ok(&mut self.srgs[srg].attributes)
    }
}
