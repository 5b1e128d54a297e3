use netdesign::domain::consistency;
use netdesign::domain::demand::RoutingType;
use netdesign::domain::design::NetworkDesign;
use netdesign::domain::element::PathElement;
use netdesign::domain::ids::{DemandId, NodeId, RouteId};
use netdesign::error::Error;

/// Square A-B-C-D (both directions) with a demand A -> C and two routes:
/// a primary over B and a candidate backup over D.
fn protected_square() -> (NetworkDesign, Vec<NodeId>, DemandId, RouteId, RouteId) {
    let mut design = NetworkDesign::new("protected");
    let layer = design.default_layer();
    let a = design.add_node("A", 0.0, 0.0);
    let b = design.add_node("B", 1.0, 0.0);
    let c = design.add_node("C", 1.0, 1.0);
    let d = design.add_node("D", 0.0, 1.0);
    let ab = design.add_link(layer, a, b, 10.0, 1.0, 200_000.0).unwrap();
    let bc = design.add_link(layer, b, c, 10.0, 1.0, 200_000.0).unwrap();
    let ad = design.add_link(layer, a, d, 10.0, 1.0, 200_000.0).unwrap();
    let dc = design.add_link(layer, d, c, 10.0, 1.0, 200_000.0).unwrap();

    let demand = design.add_demand(layer, a, c, 10.0, RoutingType::SourceRouting).unwrap();
    let primary = design
        .add_route(demand, 10.0, 10.0, vec![PathElement::Link(ab), PathElement::Link(bc)])
        .unwrap();
    // The backup is provisioned but carries nothing until activated.
    let backup = design
        .add_route(demand, 0.0, 10.0, vec![PathElement::Link(ad), PathElement::Link(dc)])
        .unwrap();
    (design, vec![a, b, c, d], demand, primary, backup)
}

#[test]
fn backup_attachment_round_trip_is_idempotent() {
    let (mut design, _, _, primary, backup) = protected_square();

    assert!(!design.route(primary).unwrap().is_protected());
    design.add_backup_route(primary, backup).unwrap();
    assert!(design.route(primary).unwrap().is_protected());
    assert_eq!(design.route(backup).unwrap().backup_of(), Some(primary));

    design.remove_backup_route(primary, backup).unwrap();
    assert!(!design.route(primary).unwrap().is_protected());
    assert_eq!(design.route(backup).unwrap().backup_of(), None);
    // Both routes are exactly as unprotected as they started.
    assert!(design.route(backup).unwrap().backups().is_empty());
    consistency::check(&design).unwrap();
}

#[test]
fn nested_backups_are_rejected() {
    let (mut design, nodes, demand, primary, backup) = protected_square();
    design.add_backup_route(primary, backup).unwrap();

    // A third route of the same demand, to try to hang off the backup.
    let layer = design.default_layer();
    let extra_link = design.add_link(layer, nodes[0], nodes[2], 10.0, 2.0, 200_000.0).unwrap();
    let third = design.add_route(demand, 0.0, 10.0, vec![PathElement::Link(extra_link)]).unwrap();

    let result = design.add_backup_route(backup, third);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));

    // A protected primary cannot become someone's backup either.
    let result = design.add_backup_route(third, primary);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
    consistency::check(&design).unwrap();
}

#[test]
fn backups_must_serve_the_same_demand() {
    let (mut design, nodes, _, primary, _) = protected_square();
    let layer = design.default_layer();
    let other_demand = design
        .add_demand(layer, nodes[0], nodes[2], 5.0, RoutingType::SourceRouting)
        .unwrap();
    let extra_link = design.add_link(layer, nodes[0], nodes[2], 10.0, 2.0, 200_000.0).unwrap();
    let foreign = design
        .add_route(other_demand, 0.0, 5.0, vec![PathElement::Link(extra_link)])
        .unwrap();

    let result = design.add_backup_route(primary, foreign);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
}

#[test]
fn double_attachment_is_rejected() {
    let (mut design, _, _, primary, backup) = protected_square();
    design.add_backup_route(primary, backup).unwrap();
    let result = design.add_backup_route(primary, backup);
    assert!(matches!(result, Err(Error::InvariantViolation(_))));
}

#[test]
fn removing_either_route_only_detaches_the_linkage() {
    let (mut design, _, demand, primary, backup) = protected_square();
    design.add_backup_route(primary, backup).unwrap();

    // Removing the primary leaves the backup as a plain route.
    design.remove_route(primary).unwrap();
    assert!(design.route(primary).is_none());
    let backup_ref = design.route(backup).unwrap();
    assert_eq!(backup_ref.backup_of(), None);
    assert_eq!(design.demand(demand).unwrap().routes(), &[backup]);
    consistency::check(&design).unwrap();

    // And the other way around.
    let (mut design, _, _, primary, backup) = protected_square();
    design.add_backup_route(primary, backup).unwrap();
    design.remove_route(backup).unwrap();
    assert!(design.route(backup).is_none());
    assert!(!design.route(primary).unwrap().is_protected());
    consistency::check(&design).unwrap();
}

#[test]
fn restoration_style_traffic_move_between_primary_and_backup() {
    let (mut design, _, demand, primary, backup) = protected_square();
    design.add_backup_route(primary, backup).unwrap();

    // External restoration logic: zero the primary, load the backup.
    design.set_route_traffic(primary, 0.0, 10.0).unwrap();
    design.set_route_traffic(backup, 10.0, 10.0).unwrap();

    let demand_ref = design.demand(demand).unwrap();
    assert_eq!(demand_ref.carried_traffic(), 10.0);
    assert_eq!(demand_ref.blocked_traffic(), 0.0);
    consistency::check(&design).unwrap();
}
