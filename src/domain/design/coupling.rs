use std::collections::{BTreeMap, BTreeSet};

use crate::domain::design::NetworkDesign;
use crate::domain::ids::{DemandId, LayerId, LinkId};
use crate::error::{Error, Result};

impl NetworkDesign {
    //----------------------------
    // --- Inter-layer coupling ---
    //----------------------------

    /// Couples a demand to a link of another layer: the demand's layer
    /// realizes the link, and from now on the link's capacity follows the
    /// demand's carried traffic.
    ///
    /// Rejected when either end is already coupled, when both live in the
    /// same layer, or when the pair would close a cycle in the
    /// layer-coupling relation (a link must never be realized, through
    /// any number of layers, by itself).
    pub fn couple_demand_to_link(&mut self, demand: DemandId, link: LinkId) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        let link_ref = self.link_ref(link)?;
        if demand_ref.layer == link_ref.layer {
            return Err(Error::InvariantViolation(format!(
                "demand {:?} and link {:?} are in the same layer; coupling spans layers",
                demand, link
            )));
        }
        if demand_ref.coupled_link.is_some() {
            return Err(Error::InvariantViolation(format!("demand {:?} is already coupled", demand)));
        }
        if link_ref.coupled_demand.is_some() {
            return Err(Error::InvariantViolation(format!("link {:?} is already coupled", link)));
        }
        if demand_ref.ingress != link_ref.origin || demand_ref.egress != link_ref.destination {
            return Err(Error::InvariantViolation(format!(
                "coupling endpoints disagree: link {:?} runs '{}' -> '{}', demand {:?} runs '{}' -> '{}'",
                link,
                self.nodes[link_ref.origin].name,
                self.nodes[link_ref.destination].name,
                demand,
                self.nodes[demand_ref.ingress].name,
                self.nodes[demand_ref.egress].name
            )));
        }

        // The coupling relation between layers must stay acyclic: edge
        // upper(link.layer) -> lower(demand.layer).
        let upper = link_ref.layer;
        let lower = demand_ref.layer;
        if self.layer_coupling_reaches(lower, upper, Some((upper, lower))) {
            return Err(Error::InvariantViolation(format!(
                "coupling demand {:?} to link {:?} would close a cycle between layers",
                demand, link
            )));
        }

        self.transactional(|design| {
            design
                .coupling
                .insert_no_overwrite(demand, link)
                .map_err(|_| Error::Inconsistency("coupling index already held one of the pair".to_string()))?;
            design.demands[demand].coupled_link = Some(link);
            design.links[link].coupled_demand = Some(demand);
            design.refresh_traffic_state()
        })?;
        log::debug!("Coupled demand {:?} (lower layer) to link {:?} (upper layer)", demand, link);
        Ok(())
    }

    /// Releases the coupling of a demand. The link keeps its last capacity.
    pub fn decouple_demand(&mut self, demand: DemandId) -> Result<()> {
        let demand_ref = self.demand_ref(demand)?;
        let Some(link) = demand_ref.coupled_link else {
            return Err(Error::InvariantViolation(format!("demand {:?} is not coupled", demand)));
        };
        self.coupling.remove_by_left(&demand);
        self.demands[demand].coupled_link = None;
        self.links[link].coupled_demand = None;
        Ok(())
    }

    /// Releases the coupling of a link. The link keeps its last capacity.
    pub fn decouple_link(&mut self, link: LinkId) -> Result<()> {
        let link_ref = self.link_ref(link)?;
        let Some(demand) = link_ref.coupled_demand else {
            return Err(Error::InvariantViolation(format!("link {:?} is not coupled", link)));
        };
        self.coupling.remove_by_right(&link);
        self.demands[demand].coupled_link = None;
        self.links[link].coupled_demand = None;
        Ok(())
    }

    /// The coupled (demand, link) pairs, ordered for deterministic output.
    pub fn coupling_pairs(&self) -> Vec<(DemandId, LinkId)> {
        let mut pairs: Vec<(DemandId, LinkId)> = self.coupling.iter().map(|(d, l)| (*d, *l)).collect();
        pairs.sort();
        pairs
    }

    /// Whether `from` reaches `to` in the layer-coupling relation
    /// (upper layer -> lower layer edges), optionally with one extra edge
    /// not yet committed.
    fn layer_coupling_reaches(&self, from: LayerId, to: LayerId, extra: Option<(LayerId, LayerId)>) -> bool {
        let mut edges: BTreeMap<LayerId, BTreeSet<LayerId>> = BTreeMap::new();
        for (demand, link) in self.coupling.iter() {
            let upper = self.links[*link].layer;
            let lower = self.demands[*demand].layer;
            edges.entry(upper).or_default().insert(lower);
        }
        if let Some((upper, lower)) = extra {
            edges.entry(upper).or_default().insert(lower);
        }

        let mut stack = vec![from];
        let mut seen: BTreeSet<LayerId> = BTreeSet::new();
        while let Some(layer) = stack.pop() {
            if layer == to {
                return true;
            }
            if !seen.insert(layer) {
                continue;
            }
            if let Some(next) = edges.get(&layer) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }
}
