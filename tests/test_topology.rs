use std::collections::BTreeMap;

use netdesign::domain::consistency;
use netdesign::domain::demand::RoutingType;
use netdesign::domain::design::NetworkDesign;
use netdesign::domain::element::PathElement;
use netdesign::domain::ids::NodeId;
use netdesign::error::Error;

/// Line topology A -> B -> C with one source-routed demand A -> C.
fn line_design() -> (NetworkDesign, Vec<NodeId>) {
    let mut design = NetworkDesign::new("line");
    let layer = design.default_layer();
    let a = design.add_node("A", 0.0, 0.0);
    let b = design.add_node("B", 1.0, 0.0);
    let c = design.add_node("C", 2.0, 0.0);
    design.add_link(layer, a, b, 10.0, 100.0, 200_000.0).unwrap();
    design.add_link(layer, b, c, 10.0, 100.0, 200_000.0).unwrap();
    (design, vec![a, b, c])
}

#[test]
fn add_and_get_round_trip() {
    let (design, nodes) = line_design();
    let layer = design.default_layer();

    assert_eq!(design.node_ids().len(), 3);
    assert_eq!(design.layer(layer).unwrap().links().len(), 2);
    assert_eq!(design.find_node_by_name("B"), Some(nodes[1]));
    assert_eq!(design.node_index(nodes[2]), Some(2));

    let ab = design.layer(layer).unwrap().links()[0];
    let link = design.link(ab).unwrap();
    assert_eq!(link.origin(), nodes[0]);
    assert_eq!(link.destination(), nodes[1]);
    assert_eq!(link.capacity(), 10.0);

    consistency::check(&design).unwrap();
}

#[test]
fn link_rejects_unknown_and_looping_endpoints() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();

    let result = design.add_link(layer, nodes[0], nodes[0], 1.0, 1.0, 200_000.0);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    design.remove_node(nodes[2]).unwrap();
    let result = design.add_link(layer, nodes[0], nodes[2], 1.0, 1.0, 200_000.0);
    assert!(matches!(result, Err(Error::ReferentialIntegrity(_))));
}

#[test]
fn removing_a_node_leaves_no_dangling_references() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();
    let demand = design
        .add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::SourceRouting)
        .unwrap();
    let links: Vec<_> = design.layer(layer).unwrap().links().to_vec();
    let route = design
        .add_route(demand, 10.0, 10.0, links.iter().map(|l| PathElement::Link(*l)).collect())
        .unwrap();

    design.remove_node(nodes[1]).unwrap();

    // The middle node took its incident links and the route through them.
    assert!(design.node(nodes[1]).is_none());
    assert!(design.link(links[0]).is_none());
    assert!(design.link(links[1]).is_none());
    assert!(design.route(route).is_none());
    // The demand survives; it just carries nothing anymore.
    let demand_ref = design.demand(demand).unwrap();
    assert!(demand_ref.routes().is_empty());
    assert_eq!(demand_ref.carried_traffic(), 0.0);
    assert_eq!(demand_ref.blocked_traffic(), 10.0);

    // Indices renumbered, stores consistent.
    assert_eq!(design.node_index(nodes[2]), Some(1));
    consistency::check(&design).unwrap();
}

#[test]
fn removing_a_demand_releases_its_routes_and_occupation() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();
    let demand = design
        .add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::SourceRouting)
        .unwrap();
    let links: Vec<_> = design.layer(layer).unwrap().links().to_vec();
    design
        .add_route(demand, 10.0, 10.0, links.iter().map(|l| PathElement::Link(*l)).collect())
        .unwrap();
    assert_eq!(design.link(links[0]).unwrap().occupied_capacity(), 10.0);

    design.remove_demand(demand).unwrap();

    assert!(design.demand(demand).is_none());
    assert_eq!(design.layer(layer).unwrap().routes().len(), 0);
    assert_eq!(design.link(links[0]).unwrap().occupied_capacity(), 0.0);
    consistency::check(&design).unwrap();
}

#[test]
fn node_removal_requires_cascading_while_resources_are_hosted() {
    let (mut design, nodes) = line_design();
    design
        .add_resource(nodes[1], "CPU", "cpu-B", 16.0, "cores", 0.0, BTreeMap::new())
        .unwrap();

    let result = design.remove_node(nodes[1]);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    assert!(design.node(nodes[1]).is_some(), "failed removal must not mutate");

    design.remove_node_cascading(nodes[1]).unwrap();
    assert!(design.node(nodes[1]).is_none());
    assert!(design.resource_ids().is_empty());
    consistency::check(&design).unwrap();
}

#[test]
fn disconnected_route_walks_are_rejected() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();
    let demand = design
        .add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::SourceRouting)
        .unwrap();
    let links: Vec<_> = design.layer(layer).unwrap().links().to_vec();

    // Skipping the first hop breaks the walk.
    let result = design.add_route(demand, 10.0, 10.0, vec![PathElement::Link(links[1])]);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    assert!(design.demand(demand).unwrap().routes().is_empty());

    // Ending before the egress breaks it too.
    let result = design.add_route(demand, 10.0, 10.0, vec![PathElement::Link(links[0])]);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    consistency::check(&design).unwrap();
}

#[test]
fn demand_routes_never_carry_more_than_offered() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();
    let demand = design
        .add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::SourceRouting)
        .unwrap();
    let path: Vec<_> =
        design.layer(layer).unwrap().links().iter().map(|l| PathElement::Link(*l)).collect();

    design.add_route(demand, 8.0, 8.0, path.clone()).unwrap();
    let result = design.add_route(demand, 8.0, 8.0, path);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    let demand_ref = design.demand(demand).unwrap();
    assert_eq!(demand_ref.routes().len(), 1);
    assert_eq!(demand_ref.carried_traffic(), 8.0);
}

#[test]
fn layer_removal_cascades_and_protects_the_default() {
    let (mut design, nodes) = line_design();
    let default = design.default_layer();
    let upper = design.add_layer("IP", "packet layer", "Gbps", "Gbps");
    design.add_link(upper, nodes[0], nodes[2], 10.0, 200.0, 200_000.0).unwrap();

    assert!(matches!(design.remove_layer(default), Err(Error::InvariantViolation(_))));

    design.remove_layer(upper).unwrap();
    assert!(design.layer(upper).is_none());
    assert_eq!(design.layer_ids().len(), 1);
    consistency::check(&design).unwrap();
}

#[test]
fn resource_capacity_is_enforced_hard() {
    let (mut design, nodes) = line_design();
    let layer = design.default_layer();
    let cpu = design
        .add_resource(nodes[1], "CPU", "cpu-B", 10.0, "cores", 0.0, BTreeMap::new())
        .unwrap();

    // A VNF consuming most of the CPU fits once, not twice.
    let mut consumption = BTreeMap::new();
    consumption.insert(cpu, 6.0);
    design
        .add_resource(nodes[1], "NAT", "nat-1", 100.0, "Mbps", 0.1, consumption.clone())
        .unwrap();
    let result = design.add_resource(nodes[1], "NAT", "nat-2", 100.0, "Mbps", 0.1, consumption);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    // Routes over a NAT are capped by its capacity as well.
    let demand = design
        .add_demand(layer, nodes[0], nodes[2], 500.0, RoutingType::SourceRouting)
        .unwrap();
    design.set_demand_service_chain(demand, vec!["NAT".to_string()]).unwrap();
    let links: Vec<_> = design.layer(layer).unwrap().links().to_vec();
    let nat = design.resources_of_type("NAT")[0];
    let path = vec![PathElement::Link(links[0]), PathElement::Resource(nat), PathElement::Link(links[1])];

    design.add_route(demand, 90.0, 90.0, path.clone()).unwrap();
    let result = design.add_route(demand, 20.0, 20.0, path);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    consistency::check(&design).unwrap();
}
