use std::collections::BTreeMap;

use netdesign::domain::consistency;
use netdesign::domain::demand::RoutingType;
use netdesign::domain::design::NetworkDesign;
use netdesign::domain::element::PathElement;
use netdesign::error::Error;

/// A design touching every store: two layers, coupling, a service-chain
/// route with a backup, hop-by-hop rules, resources and an SRG.
fn rich_design() -> NetworkDesign {
    let mut design = NetworkDesign::new("rich");
    design.set_attribute("author", "planning");

    let wdm = design.default_layer();
    let ip = design.add_layer("IP", "packet layer", "Gbps", "Gbps");

    let a = design.add_node("A", 0.0, 0.0);
    let b = design.add_node("B", 1.0, 0.0);
    let c = design.add_node("C", 2.0, 0.0);
    design.node_attributes_mut(a).unwrap().insert("site".to_string(), "west".to_string());

    let ab = design.add_link(wdm, a, b, 40.0, 80.0, 200_000.0).unwrap();
    let bc = design.add_link(wdm, b, c, 40.0, 80.0, 200_000.0).unwrap();
    let _ba = design.add_link(wdm, b, a, 40.0, 80.0, 200_000.0).unwrap();
    let cb = design.add_link(wdm, c, b, 40.0, 80.0, 200_000.0).unwrap();

    let cpu = design.add_resource(b, "CPU", "cpu-B", 16.0, "cores", 0.0, BTreeMap::new()).unwrap();
    let mut consumption = BTreeMap::new();
    consumption.insert(cpu, 4.0);
    design.add_resource(b, "FW", "fw-B", 100.0, "Mbps", 0.2, consumption).unwrap();

    // WDM lightpath with a service chain through the firewall.
    let wdm_demand = design.add_demand(wdm, a, c, 10.0, RoutingType::SourceRouting).unwrap();
    design.set_demand_service_chain(wdm_demand, vec!["FW".to_string()]).unwrap();
    let fw = design.resources_of_type("FW")[0];
    let primary = design
        .add_route(
            wdm_demand,
            10.0,
            10.0,
            vec![PathElement::Link(ab), PathElement::Resource(fw), PathElement::Link(bc)],
        )
        .unwrap();
    let backup = design
        .add_route(
            wdm_demand,
            0.0,
            10.0,
            vec![PathElement::Link(ab), PathElement::Resource(fw), PathElement::Link(bc)],
        )
        .unwrap();
    design.add_backup_route(primary, backup).unwrap();

    // IP link realized by the lightpath, plus a hop-by-hop IP demand.
    let ip_ac = design.add_link(ip, a, c, 10.0, 160.0, 200_000.0).unwrap();
    design.couple_demand_to_link(wdm_demand, ip_ac).unwrap();
    let ip_demand = design.add_demand(ip, a, c, 8.0, RoutingType::HopByHop).unwrap();
    design.set_forwarding_rules(ip_demand, &[(ip_ac, 1.0)]).unwrap();

    // Multicast in the WDM layer: A to {B, C}.
    let mcast = design.add_multicast_demand(wdm, a, vec![b, c], 2.0).unwrap();
    design.add_multicast_tree(mcast, 2.0, 2.0, vec![ab, bc]).unwrap();

    let srg = design.add_srg(8760.0, 24.0).unwrap();
    design.add_node_to_srg(srg, b).unwrap();
    design.add_link_to_srg(srg, ab).unwrap();

    // A planned failure that must survive the snapshot.
    design.set_link_state(cb, false).unwrap();

    design
}

#[test]
fn snapshot_round_trip_is_lossless() {
    let original = rich_design();
    consistency::check(&original).unwrap();

    let dto = original.to_dto();
    let restored = NetworkDesign::from_dto(&dto).unwrap();
    consistency::check(&restored).unwrap();

    let reserialized = restored.to_dto();
    assert_eq!(
        serde_json::to_value(&dto).unwrap(),
        serde_json::to_value(&reserialized).unwrap(),
        "snapshot -> design -> snapshot must be byte-stable"
    );
}

#[test]
fn restored_design_preserves_derived_state() {
    let original = rich_design();
    let restored = NetworkDesign::from_dto(&original.to_dto()).unwrap();

    let wdm = restored.default_layer();
    let ip = restored
        .layer_ids()
        .iter()
        .copied()
        .find(|l| restored.layer(*l).unwrap().name() == "IP")
        .unwrap();

    assert_eq!(restored.node_ids().len(), 3);
    assert_eq!(restored.layer(wdm).unwrap().links().len(), 4);
    assert_eq!(restored.layer(wdm).unwrap().routes().len(), 2);
    assert_eq!(restored.layer(wdm).unwrap().trees().len(), 1);
    assert_eq!(restored.coupling_pairs().len(), 1);
    assert_eq!(restored.srg_ids().len(), 1);

    // Traffic resettles to the same totals.
    assert_eq!(restored.blocked_traffic(wdm), 0.0);
    assert_eq!(restored.blocked_traffic(ip), 0.0);

    // The planned link failure survived.
    let down_links: Vec<_> = restored
        .layer(wdm)
        .unwrap()
        .links()
        .iter()
        .filter(|l| !restored.link(**l).unwrap().is_planned_up())
        .collect();
    assert_eq!(down_links.len(), 1);

    // Backup linkage survived.
    let backups: Vec<_> = restored
        .layer(wdm)
        .unwrap()
        .routes()
        .iter()
        .filter(|r| restored.route(**r).unwrap().is_backup())
        .collect();
    assert_eq!(backups.len(), 1);
}

#[test]
fn snapshots_with_dangling_references_are_rejected() {
    let original = rich_design();
    let mut dto = original.to_dto();

    // Point a link at a node index that does not exist.
    dto.layers[0].links[0].origin = 99;
    let result = NetworkDesign::from_dto(&dto);
    assert!(matches!(result, Err(Error::ReferentialIntegrity(_))));
}
