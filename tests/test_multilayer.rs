use netdesign::domain::consistency;
use netdesign::domain::demand::RoutingType;
use netdesign::domain::design::NetworkDesign;
use netdesign::domain::element::PathElement;
use netdesign::domain::ids::{DemandId, LayerId, LinkId, NodeId};
use netdesign::domain::propagation::{ElementSet, PropagationDirection, affected_closure};
use netdesign::error::Error;

struct TwoLayerFixture {
    design: NetworkDesign,
    nodes: Vec<NodeId>,
    wdm: LayerId,
    ip: LayerId,
    wdm_links: Vec<LinkId>,
    wdm_demand: DemandId,
    ip_link: LinkId,
    ip_demand: DemandId,
}

/// IP over WDM: a WDM lightpath A -> B -> C realizes one IP link A -> C,
/// which carries an IP demand A -> C.
fn ip_over_wdm() -> TwoLayerFixture {
    let mut design = NetworkDesign::new("ip-over-wdm");
    let wdm = design.default_layer();
    let ip = design.add_layer("IP", "packet layer", "Gbps", "Gbps");

    let a = design.add_node("A", 0.0, 0.0);
    let b = design.add_node("B", 1.0, 0.0);
    let c = design.add_node("C", 2.0, 0.0);

    let ab = design.add_link(wdm, a, b, 40.0, 80.0, 200_000.0).unwrap();
    let bc = design.add_link(wdm, b, c, 40.0, 80.0, 200_000.0).unwrap();

    let wdm_demand = design.add_demand(wdm, a, c, 10.0, RoutingType::SourceRouting).unwrap();
    design
        .add_route(wdm_demand, 10.0, 10.0, vec![PathElement::Link(ab), PathElement::Link(bc)])
        .unwrap();

    let ip_link = design.add_link(ip, a, c, 10.0, 160.0, 200_000.0).unwrap();
    design.couple_demand_to_link(wdm_demand, ip_link).unwrap();

    let ip_demand = design.add_demand(ip, a, c, 10.0, RoutingType::SourceRouting).unwrap();
    design.add_route(ip_demand, 10.0, 10.0, vec![PathElement::Link(ip_link)]).unwrap();

    TwoLayerFixture { design, nodes: vec![a, b, c], wdm, ip, wdm_links: vec![ab, bc], wdm_demand, ip_link, ip_demand }
}

#[test]
fn coupling_pins_the_link_capacity_to_the_demand() {
    let fixture = ip_over_wdm();
    let design = fixture.design;

    // The lightpath carries 10, so the IP link offers 10.
    assert_eq!(design.link(fixture.ip_link).unwrap().capacity(), 10.0);
    assert_eq!(design.link(fixture.ip_link).unwrap().coupled_demand(), Some(fixture.wdm_demand));
    assert_eq!(design.demand(fixture.wdm_demand).unwrap().coupled_link(), Some(fixture.ip_link));
    consistency::check(&design).unwrap();
}

#[test]
fn coupled_link_capacity_cannot_be_edited_directly() {
    let mut fixture = ip_over_wdm();
    let result = fixture.design.set_link_capacity(fixture.ip_link, 100.0);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
}

#[test]
fn coupling_rejects_same_layer_and_double_coupling() {
    let mut fixture = ip_over_wdm();
    let wdm = fixture.wdm;
    let nodes = &fixture.nodes;

    // Same layer.
    let wdm_direct = fixture.design.add_link(wdm, nodes[0], nodes[2], 40.0, 160.0, 200_000.0).unwrap();
    let other = fixture.design.add_demand(wdm, nodes[0], nodes[2], 5.0, RoutingType::SourceRouting).unwrap();
    let result = fixture.design.couple_demand_to_link(other, wdm_direct);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    // Already coupled on the link side.
    let result = fixture.design.couple_demand_to_link(other, fixture.ip_link);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
}

#[test]
fn coupling_cycles_between_layers_are_rejected() {
    let mut fixture = ip_over_wdm();
    let nodes = &fixture.nodes;

    // An IP demand A -> B trying to realize a WDM link A -> B would make
    // the IP layer realize the WDM layer that realizes the IP layer.
    let ip_demand_ab =
        fixture.design.add_demand(fixture.ip, nodes[0], nodes[1], 5.0, RoutingType::SourceRouting).unwrap();
    let result = fixture.design.couple_demand_to_link(ip_demand_ab, fixture.wdm_links[0]);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    consistency::check(&fixture.design).unwrap();
}

#[test]
fn downward_closure_reaches_the_physical_links() {
    let fixture = ip_over_wdm();
    let seed = ElementSet::default().with_link(fixture.ip_link);
    let closure = affected_closure(&fixture.design, &seed, PropagationDirection::Downward);

    assert!(closure.demands.contains(&fixture.wdm_demand));
    assert!(closure.links.contains(&fixture.wdm_links[0]));
    assert!(closure.links.contains(&fixture.wdm_links[1]));
}

#[test]
fn upward_closure_reaches_the_logical_demands() {
    let fixture = ip_over_wdm();
    let seed = ElementSet::default().with_link(fixture.wdm_links[0]);
    let closure = affected_closure(&fixture.design, &seed, PropagationDirection::Upward);

    assert!(closure.demands.contains(&fixture.wdm_demand));
    assert!(closure.links.contains(&fixture.ip_link));
    assert!(closure.demands.contains(&fixture.ip_demand));
}

#[test]
fn closure_ignores_elements_that_cannot_carry_the_seed() {
    let mut fixture = ip_over_wdm();
    let nodes = &fixture.nodes;

    // A second, unrouted WDM demand shares the layer but carries nothing
    // over the failed link, so the closure must not pick it up.
    let idle = fixture.design.add_demand(fixture.wdm, nodes[0], nodes[1], 1.0, RoutingType::SourceRouting).unwrap();
    let seed = ElementSet::default().with_link(fixture.wdm_links[0]);
    let closure = affected_closure(&fixture.design, &seed, PropagationDirection::Upward);
    assert!(!closure.demands.contains(&idle));
}

#[test]
fn physical_failure_starves_the_coupled_ip_link() {
    let mut fixture = ip_over_wdm();

    fixture.design.set_link_state(fixture.wdm_links[0], false).unwrap();

    // The lightpath is down, so the IP link's realized capacity collapses
    // to zero while its IP route keeps pushing 10: tracked oversubscription.
    assert_eq!(fixture.design.demand(fixture.wdm_demand).unwrap().carried_traffic(), 0.0);
    let ip_link = fixture.design.link(fixture.ip_link).unwrap();
    assert_eq!(ip_link.capacity(), 0.0);
    assert_eq!(ip_link.occupied_capacity(), 10.0);
    assert!(ip_link.is_oversubscribed());
    assert_eq!(fixture.design.oversubscribed_links(fixture.ip), vec![fixture.ip_link]);

    // Repairing the lightpath heals the whole stack.
    fixture.design.set_link_state(fixture.wdm_links[0], true).unwrap();
    assert_eq!(fixture.design.link(fixture.ip_link).unwrap().capacity(), 10.0);
    assert!(!fixture.design.link(fixture.ip_link).unwrap().is_oversubscribed());
    consistency::check(&fixture.design).unwrap();
}

#[test]
fn decoupling_frees_both_sides() {
    let mut fixture = ip_over_wdm();
    fixture.design.decouple_link(fixture.ip_link).unwrap();

    assert_eq!(fixture.design.link(fixture.ip_link).unwrap().coupled_demand(), None);
    assert_eq!(fixture.design.demand(fixture.wdm_demand).unwrap().coupled_link(), None);
    // The link keeps its last realized capacity but is editable again.
    fixture.design.set_link_capacity(fixture.ip_link, 40.0).unwrap();
    assert_eq!(fixture.design.link(fixture.ip_link).unwrap().capacity(), 40.0);
    consistency::check(&fixture.design).unwrap();
}
