use assert_approx_eq::assert_approx_eq;

use netdesign::domain::algorithms::{CostMetric, LayerGraph, default_link_costs};
use netdesign::domain::consistency;
use netdesign::domain::demand::RoutingType;
use netdesign::domain::design::NetworkDesign;
use netdesign::domain::element::PathElement;
use netdesign::domain::ids::{LinkId, NodeId};
use netdesign::domain::traffic::ecmp_forwarding_rules;
use netdesign::error::Error;

/// Square A-B-C-D, links both ways, capacity 10, cost 1.
fn square() -> (NetworkDesign, Vec<NodeId>, Vec<LinkId>) {
    let mut design = NetworkDesign::new("square");
    let layer = design.default_layer();
    let a = design.add_node("A", 0.0, 0.0);
    let b = design.add_node("B", 1.0, 0.0);
    let c = design.add_node("C", 1.0, 1.0);
    let d = design.add_node("D", 0.0, 1.0);
    let mut links = Vec::new();
    for (u, v) in [(a, b), (b, c), (c, d), (a, d)] {
        links.push(design.add_link(layer, u, v, 10.0, 1.0, 200_000.0).unwrap());
        links.push(design.add_link(layer, v, u, 10.0, 1.0, 200_000.0).unwrap());
    }
    (design, vec![a, b, c, d], links)
}

#[test]
fn link_failure_blocks_the_traffic_of_routes_over_it() {
    let (mut design, nodes, links) = square();
    let layer = design.default_layer();
    let ad = links[6]; // A -> D
    let demand = design.add_demand(layer, nodes[0], nodes[3], 10.0, RoutingType::SourceRouting).unwrap();
    let route = design.add_route(demand, 10.0, 10.0, vec![PathElement::Link(ad)]).unwrap();

    assert_eq!(design.demand(demand).unwrap().blocked_traffic(), 0.0);
    assert_eq!(design.link(ad).unwrap().occupied_capacity(), 10.0);

    design.set_link_state(ad, false).unwrap();

    assert!(design.route_is_down(route));
    let demand_ref = design.demand(demand).unwrap();
    assert_eq!(demand_ref.carried_traffic(), 0.0);
    assert_eq!(demand_ref.blocked_traffic(), 10.0);
    // The failed link releases its occupation; nothing else changes.
    assert_eq!(design.link(ad).unwrap().occupied_capacity(), 0.0);
    for link in &links {
        assert!(!design.link(*link).unwrap().is_oversubscribed());
    }

    // Repair restores the carried traffic.
    design.set_link_state(ad, true).unwrap();
    assert_eq!(design.demand(demand).unwrap().blocked_traffic(), 0.0);
    consistency::check(&design).unwrap();
}

#[test]
fn node_failure_takes_incident_routes_down() {
    let (mut design, nodes, links) = square();
    let layer = design.default_layer();
    let demand = design.add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::SourceRouting).unwrap();
    let route = design
        .add_route(demand, 10.0, 10.0, vec![PathElement::Link(links[0]), PathElement::Link(links[2])])
        .unwrap();

    design.set_node_state(nodes[1], false).unwrap();
    assert!(design.route_is_down(route));
    assert!(!design.link_is_up(links[0]), "links of a down node are effectively down");
    assert_eq!(design.demand(demand).unwrap().blocked_traffic(), 10.0);

    design.set_node_state(nodes[1], true).unwrap();
    assert!(!design.route_is_down(route));
    consistency::check(&design).unwrap();
}

#[test]
fn srg_down_and_up_round_trips_losslessly() {
    let (mut design, nodes, links) = square();
    let srg = design.add_srg(1000.0, 12.0).unwrap();
    design.add_node_to_srg(srg, nodes[1]).unwrap();
    design.add_link_to_srg(srg, links[6]).unwrap();

    design.set_srg_state(srg, false).unwrap();
    assert!(!design.node_is_up(nodes[1]));
    assert!(!design.link_is_up(links[6]));
    // Members keep their planned state; only the effective state changed.
    assert!(design.node(nodes[1]).unwrap().is_planned_up());

    design.set_srg_state(srg, true).unwrap();
    assert!(design.node_is_up(nodes[1]));
    assert!(design.link_is_up(links[6]));
    consistency::check(&design).unwrap();
}

#[test]
fn srg_up_does_not_revive_independently_failed_members() {
    let (mut design, nodes, _links) = square();
    let srg = design.add_srg(1000.0, 12.0).unwrap();
    design.add_node_to_srg(srg, nodes[1]).unwrap();
    design.add_node_to_srg(srg, nodes[2]).unwrap();

    // Node C fails on its own, then the SRG fails and recovers.
    design.set_node_state(nodes[2], false).unwrap();
    design.set_srg_state(srg, false).unwrap();
    assert!(!design.node_is_up(nodes[1]));
    assert!(!design.node_is_up(nodes[2]));

    design.set_srg_state(srg, true).unwrap();
    assert!(design.node_is_up(nodes[1]), "SRG member comes back with the SRG");
    assert!(!design.node_is_up(nodes[2]), "independently failed member stays down");
    consistency::check(&design).unwrap();
}

#[test]
fn ecmp_rules_split_equally_over_shortest_paths() {
    let (mut design, nodes, _) = square();
    let layer = design.default_layer();
    let demand = design.add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::HopByHop).unwrap();

    let costs = default_link_costs(&design, layer, CostMetric::Hops).unwrap();
    let graph = LayerGraph::build(&design, layer, &costs).unwrap();
    let rules = ecmp_forwarding_rules(&design, &graph, demand, &costs).unwrap();
    design.set_forwarding_rules(demand, &rules).unwrap();

    let demand_ref = design.demand(demand).unwrap();
    assert_approx_eq!(demand_ref.carried_traffic(), 10.0);
    assert_eq!(demand_ref.blocked_traffic(), 0.0);

    // Two equal-cost branches out of A, half the traffic on each.
    let out_of_a: Vec<f64> = demand_ref
        .forwarding_rules()
        .iter()
        .filter(|(l, _)| design.link(**l).unwrap().origin() == nodes[0])
        .map(|(_, ratio)| *ratio)
        .collect();
    assert_eq!(out_of_a, vec![0.5, 0.5]);

    let on_first_hop = demand_ref
        .hop_by_hop_link_traffic()
        .iter()
        .filter(|(l, _)| design.link(**l).unwrap().origin() == nodes[0])
        .map(|(_, t)| *t)
        .sum::<f64>();
    assert_approx_eq!(on_first_hop, 10.0);
    consistency::check(&design).unwrap();
}

#[test]
fn hop_by_hop_traffic_reroutes_to_blocked_on_failure() {
    let (mut design, nodes, links) = square();
    let layer = design.default_layer();
    let demand = design.add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::HopByHop).unwrap();
    let costs = default_link_costs(&design, layer, CostMetric::Hops).unwrap();
    let graph = LayerGraph::build(&design, layer, &costs).unwrap();
    let rules = ecmp_forwarding_rules(&design, &graph, demand, &costs).unwrap();
    design.set_forwarding_rules(demand, &rules).unwrap();

    // Kill the A -> B branch: its half of the traffic has no rule to
    // follow anymore and must show up as blocked, not silently vanish.
    design.set_link_state(links[0], false).unwrap();
    let demand_ref = design.demand(demand).unwrap();
    assert_approx_eq!(demand_ref.carried_traffic(), 5.0);
    assert_approx_eq!(demand_ref.blocked_traffic(), 5.0);
    consistency::check(&design).unwrap();
}

#[test]
fn routing_loops_are_reported_not_spun_on() {
    let (mut design, nodes, links) = square();
    let layer = design.default_layer();
    let demand = design.add_demand(layer, nodes[0], nodes[2], 10.0, RoutingType::HopByHop).unwrap();

    // A -> B and B -> A at full ratio: a closed loop fed by the ingress.
    let ab = links[0];
    let ba = links[1];
    let result = design.set_forwarding_rules(demand, &[(ab, 1.0), (ba, 1.0)]);
    assert!(matches!(result, Err(Error::NonConvergence(_))));

    // The failed call must leave no trace.
    assert!(design.demand(demand).unwrap().forwarding_rules().is_empty());
    consistency::check(&design).unwrap();
}

#[test]
fn oversubscription_is_tracked_not_rejected() {
    let (mut design, nodes, links) = square();
    let layer = design.default_layer();
    let ad = links[6];
    let demand = design.add_demand(layer, nodes[0], nodes[3], 30.0, RoutingType::SourceRouting).unwrap();
    design.add_route(demand, 25.0, 25.0, vec![PathElement::Link(ad)]).unwrap();

    // 25 units on a 10-unit link: flagged, never refused.
    let link = design.link(ad).unwrap();
    assert_eq!(link.occupied_capacity(), 25.0);
    assert!(link.is_oversubscribed());
    assert_eq!(design.oversubscribed_links(layer), vec![ad]);
    consistency::check(&design).unwrap();
}
