use crate::domain::element::PathElement;
use crate::domain::ids::{AttributeMap, DemandId, LayerId, LinkId, ResourceId, RouteId};

/// One path serving a source-routed demand.
///
/// The path is a connected walk from the demand ingress to its egress,
/// traversing resources in the order of the demand's service chain when
/// one is set. Backup linkage is annotation only: it never reroutes
/// traffic by itself, external restoration logic decides when a backup is
/// activated.
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) uid: u64,
    pub(crate) layer: LayerId,
    pub(crate) demand: DemandId,

    pub(crate) path: Vec<PathElement>,

    /// Occupied capacity per path element, parallel to `path`. Normally
    /// uniform over the links, but segments may differ when a route is
    /// partially failed.
    pub(crate) occupation: Vec<f64>,

    pub(crate) carried_traffic: f64,

    /// Set when this route is a backup of another route of the same
    /// demand. A backup cannot itself have backups.
    pub(crate) backup_of: Option<RouteId>,

    /// Backup routes attached to this (primary) route.
    pub(crate) backups: Vec<RouteId>,

    pub(crate) attributes: AttributeMap,
}

impl Route {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn demand(&self) -> DemandId {
        self.demand
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    pub fn occupation(&self) -> &[f64] {
        &self.occupation
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    pub fn backup_of(&self) -> Option<RouteId> {
        self.backup_of
    }

    pub fn is_backup(&self) -> bool {
        self.backup_of.is_some()
    }

    pub fn backups(&self) -> &[RouteId] {
        &self.backups
    }

    pub fn is_protected(&self) -> bool {
        !self.backups.is_empty()
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Links of the path, in traversal order.
    pub fn link_sequence(&self) -> Vec<LinkId> {
        self.path.iter().filter_map(PathElement::as_link).collect()
    }

    /// Resources of the path, in traversal order.
    pub fn resource_sequence(&self) -> Vec<ResourceId> {
        self.path.iter().filter_map(PathElement::as_resource).collect()
    }

    /// Occupied capacity on one specific traversed element (first match).
    pub fn occupation_on(&self, element: PathElement) -> f64 {
        self.path
            .iter()
            .zip(self.occupation.iter())
            .find(|(e, _)| **e == element)
            .map(|(_, occ)| *occ)
            .unwrap_or(0.0)
    }
}
