use crate::domain::ids::{LinkId, ResourceId};

/// One step of a route walk.
///
/// A service-chain route alternates link sub-paths with the resources it
/// traverses, so path positions are either a Link or a Resource. Every
/// consumer matches exhaustively on this; there is no runtime type probing
/// anywhere in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathElement {
    Link(LinkId),
    Resource(ResourceId),
}

impl PathElement {
    pub fn as_link(&self) -> Option<LinkId> {
        match self {
            PathElement::Link(id) => Some(*id),
            PathElement::Resource(_) => None,
        }
    }

    pub fn as_resource(&self) -> Option<ResourceId> {
        match self {
            PathElement::Link(_) => None,
            PathElement::Resource(id) => Some(*id),
        }
    }
}
