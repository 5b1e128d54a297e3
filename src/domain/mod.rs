pub mod algorithms;
pub mod consistency;
pub mod demand;
pub mod design;
pub mod element;
pub mod ids;
pub mod layer;
pub mod link;
pub mod multicast;
pub mod node;
pub mod propagation;
pub mod resource;
pub mod route;
pub mod srg;
pub mod traffic;

/// Tolerance for all capacity/traffic comparisons.
pub(crate) const EPS: f64 = 1e-9;

pub use demand::{Demand, RoutingType};
pub use design::NetworkDesign;
pub use element::PathElement;
pub use ids::{
    AttributeMap, DemandId, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId,
    ResourceId, RouteId, SrgId,
};
pub use layer::NetworkLayer;
pub use link::Link;
pub use multicast::{MulticastDemand, MulticastTree};
pub use node::Node;
pub use resource::Resource;
pub use route::Route;
pub use srg::SharedRiskGroup;
