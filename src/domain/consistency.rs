use std::collections::BTreeSet;

use crate::domain::demand::RoutingType;
use crate::domain::design::NetworkDesign;
use crate::domain::element::PathElement;
use crate::error::{Error, Result};

/// Tolerance for comparing cached traffic sums against recomputation.
const SUM_EPS: f64 = 1e-6;

/// Revalidates every cached relationship of the design against its
/// primary state.
///
/// Any disagreement is a defect in the mutation cascade logic, not a
/// user-input problem, and comes back as the fatal `Error::Inconsistency`
/// naming the offending entity. Meant to run after batches of mutations
/// (the GUI contract) and after loading a snapshot.
pub fn check(design: &NetworkDesign) -> Result<()> {
    check_orderings(design)?;
    check_incidence(design)?;
    check_routes(design)?;
    check_trees(design)?;
    check_resources(design)?;
    check_coupling(design)?;
    check_srgs(design)?;
    check_traffic_sums(design)?;
    Ok(())
}

fn fail(message: String) -> Result<()> {
    Err(Error::Inconsistency(message))
}

/// Ordering vectors and slotmaps must list exactly the same entities, and
/// per-layer vectors must agree with the entities' own layer field.
fn check_orderings(design: &NetworkDesign) -> Result<()> {
    if design.layer(design.default_layer()).is_none() {
        return fail("default layer does not exist".to_string());
    }
    if design.layer_ids().len() != design.layers.len() {
        return fail("layer ordering and store disagree in size".to_string());
    }
    for layer in design.layer_ids() {
        if design.layer(*layer).is_none() {
            return fail(format!("layer ordering lists unknown layer {:?}", layer));
        }
    }
    if design.node_ids().len() != design.nodes.len() {
        return fail("node ordering and store disagree in size".to_string());
    }
    for node in design.node_ids() {
        if design.node(*node).is_none() {
            return fail(format!("node ordering lists unknown node {:?}", node));
        }
    }
    if design.resource_ids().len() != design.resources.len() {
        return fail("resource ordering and store disagree in size".to_string());
    }
    if design.srg_ids().len() != design.srgs.len() {
        return fail("SRG ordering and store disagree in size".to_string());
    }

    let mut listed_links = 0usize;
    let mut listed_demands = 0usize;
    let mut listed_mcasts = 0usize;
    let mut listed_routes = 0usize;
    let mut listed_trees = 0usize;
    for layer_id in design.layer_ids() {
        let layer = design.layer(*layer_id).expect("checked above");
        for link in layer.links() {
            match design.link(*link) {
                Some(l) if l.layer() == *layer_id => listed_links += 1,
                Some(_) => return fail(format!("link {:?} is listed in the wrong layer", link)),
                None => return fail(format!("layer lists unknown link {:?}", link)),
            }
        }
        for demand in layer.demands() {
            match design.demand(*demand) {
                Some(d) if d.layer() == *layer_id => listed_demands += 1,
                Some(_) => return fail(format!("demand {:?} is listed in the wrong layer", demand)),
                None => return fail(format!("layer lists unknown demand {:?}", demand)),
            }
        }
        for mcast in layer.multicast_demands() {
            match design.multicast_demand(*mcast) {
                Some(m) if m.layer() == *layer_id => listed_mcasts += 1,
                Some(_) => return fail(format!("multicast demand {:?} is listed in the wrong layer", mcast)),
                None => return fail(format!("layer lists unknown multicast demand {:?}", mcast)),
            }
        }
        for route in layer.routes() {
            match design.route(*route) {
                Some(r) if r.layer() == *layer_id => listed_routes += 1,
                Some(_) => return fail(format!("route {:?} is listed in the wrong layer", route)),
                None => return fail(format!("layer lists unknown route {:?}", route)),
            }
        }
        for tree in layer.trees() {
            match design.multicast_tree(*tree) {
                Some(t) if t.layer() == *layer_id => listed_trees += 1,
                Some(_) => return fail(format!("multicast tree {:?} is listed in the wrong layer", tree)),
                None => return fail(format!("layer lists unknown multicast tree {:?}", tree)),
            }
        }
    }
    if listed_links != design.links.len() {
        return fail("some links are missing from their layer ordering".to_string());
    }
    if listed_demands != design.demands.len() {
        return fail("some demands are missing from their layer ordering".to_string());
    }
    if listed_mcasts != design.multicast_demands.len() {
        return fail("some multicast demands are missing from their layer ordering".to_string());
    }
    if listed_routes != design.routes.len() {
        return fail("some routes are missing from their layer ordering".to_string());
    }
    if listed_trees != design.trees.len() {
        return fail("some multicast trees are missing from their layer ordering".to_string());
    }
    Ok(())
}

/// Node↔link incidence caches must mirror the links' endpoints.
fn check_incidence(design: &NetworkDesign) -> Result<()> {
    for (link_id, link) in design.links.iter() {
        let origin = design
            .node(link.origin())
            .ok_or_else(|| Error::Inconsistency(format!("link {:?} has unknown origin", link_id)))?;
        let destination = design
            .node(link.destination())
            .ok_or_else(|| Error::Inconsistency(format!("link {:?} has unknown destination", link_id)))?;
        if origin.out_links().iter().filter(|l| **l == link_id).count() != 1 {
            return fail(format!("origin of link {:?} does not cache it exactly once", link_id));
        }
        if destination.in_links().iter().filter(|l| **l == link_id).count() != 1 {
            return fail(format!("destination of link {:?} does not cache it exactly once", link_id));
        }
    }
    for (node_id, node) in design.nodes.iter() {
        for link in node.out_links() {
            match design.link(*link) {
                Some(l) if l.origin() == node_id => {}
                _ => return fail(format!("node {:?} caches a stale outgoing link {:?}", node_id, link)),
            }
        }
        for link in node.in_links() {
            match design.link(*link) {
                Some(l) if l.destination() == node_id => {}
                _ => return fail(format!("node {:?} caches a stale incoming link {:?}", node_id, link)),
            }
        }
        for resource in node.resources() {
            match design.resource(*resource) {
                Some(r) if r.host() == node_id => {}
                _ => return fail(format!("node {:?} caches a stale resource {:?}", node_id, resource)),
            }
        }
    }
    Ok(())
}

/// Demand↔route membership, walk validity and backup linkage symmetry.
fn check_routes(design: &NetworkDesign) -> Result<()> {
    for (demand_id, demand) in design.demands.iter() {
        for route in demand.routes() {
            match design.route(*route) {
                Some(r) if r.demand() == demand_id => {}
                _ => return fail(format!("demand {:?} caches a stale route {:?}", demand_id, route)),
            }
        }
        if demand.routing_type() == RoutingType::HopByHop && !demand.routes().is_empty() {
            return fail(format!("hop-by-hop demand {:?} owns routes", demand_id));
        }
    }
    for (route_id, route) in design.routes.iter() {
        let demand = design
            .demand(route.demand())
            .ok_or_else(|| Error::Inconsistency(format!("route {:?} serves an unknown demand", route_id)))?;
        if !demand.routes().contains(&route_id) {
            return fail(format!("route {:?} is missing from its demand's cache", route_id));
        }
        if route.occupation().len() != route.path().len() {
            return fail(format!("route {:?} occupation vector does not match its path", route_id));
        }
        if design.validate_route_path(route.demand(), route.path()).is_err() {
            return fail(format!("route {:?} path is no longer a valid walk", route_id));
        }

        // Link traversal caches.
        let links: BTreeSet<_> = route.link_sequence().into_iter().collect();
        for link in &links {
            let link_ref = design.link(*link).expect("walk validation resolved the link");
            if link_ref.traversing_routes().iter().filter(|r| **r == route_id).count() != 1 {
                return fail(format!("link {:?} does not cache route {:?} exactly once", link, route_id));
            }
        }

        // Backup linkage.
        if let Some(primary) = route.backup_of() {
            let primary_ref = design
                .route(primary)
                .ok_or_else(|| Error::Inconsistency(format!("route {:?} backs an unknown route", route_id)))?;
            if !primary_ref.backups().contains(&route_id) {
                return fail(format!("backup linkage of routes {:?}/{:?} is one-sided", primary, route_id));
            }
            if !route.backups().is_empty() {
                return fail(format!("backup route {:?} has backups of its own", route_id));
            }
            if primary_ref.demand() != route.demand() {
                return fail(format!("backup route {:?} serves another demand than its primary", route_id));
            }
        }
        for backup in route.backups() {
            match design.route(*backup) {
                Some(b) if b.backup_of() == Some(route_id) => {}
                _ => return fail(format!("route {:?} caches a stale backup {:?}", route_id, backup)),
            }
        }
    }
    for (link_id, link) in design.links.iter() {
        for route in link.traversing_routes() {
            match design.route(*route) {
                Some(r) if r.link_sequence().contains(&link_id) => {}
                _ => return fail(format!("link {:?} caches a stale traversing route {:?}", link_id, route)),
            }
        }
    }
    Ok(())
}

/// Multicast demand↔tree membership and tree shape.
fn check_trees(design: &NetworkDesign) -> Result<()> {
    for (mcast_id, mcast) in design.multicast_demands.iter() {
        for tree in mcast.trees() {
            match design.multicast_tree(*tree) {
                Some(t) if t.demand() == mcast_id => {}
                _ => return fail(format!("multicast demand {:?} caches a stale tree {:?}", mcast_id, tree)),
            }
        }
    }
    for (tree_id, tree) in design.trees.iter() {
        let mcast = design.multicast_demand(tree.demand()).ok_or_else(|| {
            Error::Inconsistency(format!("multicast tree {:?} serves an unknown demand", tree_id))
        })?;
        if !mcast.trees().contains(&tree_id) {
            return fail(format!("multicast tree {:?} is missing from its demand's cache", tree_id));
        }
        let reached = design
            .validate_tree_links(tree.demand(), tree.layer(), mcast.ingress(), tree.links())
            .map_err(|_| Error::Inconsistency(format!("multicast tree {:?} is no longer a tree", tree_id)))?;
        let expected: Vec<_> = mcast.egress_nodes().iter().copied().filter(|e| reached.contains(e)).collect();
        if expected != tree.reached_egress() {
            return fail(format!("multicast tree {:?} caches stale reached egress nodes", tree_id));
        }
        for link in tree.links() {
            let link_ref = design.link(*link).expect("tree validation resolved the link");
            if link_ref.traversing_trees().iter().filter(|t| **t == tree_id).count() != 1 {
                return fail(format!("link {:?} does not cache tree {:?} exactly once", link, tree_id));
            }
        }
    }
    for (link_id, link) in design.links.iter() {
        for tree in link.traversing_trees() {
            match design.multicast_tree(*tree) {
                Some(t) if t.links().contains(&link_id) => {}
                _ => return fail(format!("link {:?} caches a stale traversing tree {:?}", link_id, tree)),
            }
        }
    }
    Ok(())
}

/// Occupation maps, base-consumption mirrors and the hard capacity rule.
fn check_resources(design: &NetworkDesign) -> Result<()> {
    for (resource_id, resource) in design.resources.iter() {
        if design.node(resource.host()).is_none() {
            return fail(format!("resource {:?} is hosted at an unknown node", resource_id));
        }
        for (route, occupied) in resource.occupation() {
            let route_ref = design
                .route(*route)
                .ok_or_else(|| Error::Inconsistency(format!("resource {:?} caches a stale route {:?}", resource_id, route)))?;
            let expected: f64 = route_ref
                .path()
                .iter()
                .zip(route_ref.occupation().iter())
                .filter(|(e, _)| **e == PathElement::Resource(resource_id))
                .map(|(_, occ)| *occ)
                .sum();
            if (expected - occupied).abs() > SUM_EPS {
                return fail(format!(
                    "resource {:?} caches occupation {} for route {:?}, path says {}",
                    resource_id, occupied, route, expected
                ));
            }
        }
        for (base, consumed) in resource.consumes_from_base() {
            match design.resource(*base) {
                Some(b) if b.consumed_by_upper().get(&resource_id) == Some(consumed) => {
                    if b.host() != resource.host() {
                        return fail(format!(
                            "resource {:?} consumes from base {:?} on another node",
                            resource_id, base
                        ));
                    }
                }
                _ => return fail(format!("base consumption of resource {:?} is one-sided", resource_id)),
            }
        }
        for (upper, consumed) in resource.consumed_by_upper() {
            match design.resource(*upper) {
                Some(u) if u.consumes_from_base().get(&resource_id) == Some(consumed) => {}
                _ => return fail(format!("upper consumption of resource {:?} is one-sided", resource_id)),
            }
        }
        if resource.occupied_capacity() > resource.capacity() + SUM_EPS {
            return fail(format!(
                "resource {:?} occupation {} exceeds its hard capacity {}",
                resource_id,
                resource.occupied_capacity(),
                resource.capacity()
            ));
        }
    }
    Ok(())
}

/// The coupling bimap must mirror the entity fields, pair distinct layers
/// with matching endpoints, and stay acyclic across layers.
fn check_coupling(design: &NetworkDesign) -> Result<()> {
    for (demand_id, link_id) in design.coupling_pairs() {
        let demand = design
            .demand(demand_id)
            .ok_or_else(|| Error::Inconsistency(format!("coupling lists unknown demand {:?}", demand_id)))?;
        let link = design
            .link(link_id)
            .ok_or_else(|| Error::Inconsistency(format!("coupling lists unknown link {:?}", link_id)))?;
        if demand.coupled_link() != Some(link_id) || link.coupled_demand() != Some(demand_id) {
            return fail(format!("coupling pair {:?}/{:?} is one-sided", demand_id, link_id));
        }
        if demand.layer() == link.layer() {
            return fail(format!("coupling pair {:?}/{:?} stays within one layer", demand_id, link_id));
        }
        if demand.ingress() != link.origin() || demand.egress() != link.destination() {
            return fail(format!("coupling pair {:?}/{:?} endpoints disagree", demand_id, link_id));
        }
    }
    for (demand_id, demand) in design.demands.iter() {
        if let Some(link) = demand.coupled_link() {
            if design.coupling.get_by_left(&demand_id) != Some(&link) {
                return fail(format!("demand {:?} caches a coupling the index does not know", demand_id));
            }
        }
    }
    for (link_id, link) in design.links.iter() {
        if let Some(demand) = link.coupled_demand() {
            if design.coupling.get_by_right(&link_id) != Some(&demand) {
                return fail(format!("link {:?} caches a coupling the index does not know", link_id));
            }
        }
    }

    // Acyclicity of the layer-coupling relation, by exhaustion: no layer
    // may reach itself.
    for layer in design.layer_ids() {
        let mut stack: Vec<_> = vec![*layer];
        let mut seen = BTreeSet::new();
        let mut first = true;
        while let Some(current) = stack.pop() {
            if current == *layer && !first {
                return fail(format!("layer {:?} is realized, transitively, by itself", layer));
            }
            first = false;
            if !seen.insert(current) {
                continue;
            }
            for (demand_id, link_id) in design.coupling_pairs() {
                let upper = design.links[link_id].layer();
                if upper == current {
                    stack.push(design.demands[demand_id].layer());
                }
            }
        }
    }
    Ok(())
}

/// SRG membership caches must be two-sided.
fn check_srgs(design: &NetworkDesign) -> Result<()> {
    for (srg_id, srg) in design.srgs.iter() {
        for node in srg.nodes() {
            match design.node(*node) {
                Some(n) if n.srgs().contains(&srg_id) => {}
                _ => return fail(format!("SRG {:?} membership of node {:?} is one-sided", srg_id, node)),
            }
        }
        for link in srg.links() {
            match design.link(*link) {
                Some(l) if l.srgs().contains(&srg_id) => {}
                _ => return fail(format!("SRG {:?} membership of link {:?} is one-sided", srg_id, link)),
            }
        }
    }
    for (node_id, node) in design.nodes.iter() {
        for srg in node.srgs() {
            match design.srg(*srg) {
                Some(s) if s.contains_node(node_id) => {}
                _ => return fail(format!("node {:?} caches a stale SRG {:?}", node_id, srg)),
            }
        }
    }
    for (link_id, link) in design.links.iter() {
        for srg in link.srgs() {
            match design.srg(*srg) {
                Some(s) if s.contains_link(link_id) => {}
                _ => return fail(format!("link {:?} caches a stale SRG {:?}", link_id, srg)),
            }
        }
    }
    Ok(())
}

/// Cached carried/occupied sums must match a recomputation from the
/// routes, trees and resolved hop-by-hop flows.
fn check_traffic_sums(design: &NetworkDesign) -> Result<()> {
    for (link_id, link) in design.links.iter() {
        let mut carried = 0.0;
        let mut occupied = 0.0;
        for route in link.traversing_routes() {
            if design.route_is_down(*route) {
                continue;
            }
            let route_ref = &design.routes[*route];
            carried += route_ref.carried_traffic();
            occupied += route_ref
                .path()
                .iter()
                .zip(route_ref.occupation().iter())
                .filter(|(e, _)| **e == PathElement::Link(link_id))
                .map(|(_, occ)| *occ)
                .sum::<f64>();
        }
        for tree in link.traversing_trees() {
            if design.tree_is_down(*tree) {
                continue;
            }
            let tree_ref = &design.trees[*tree];
            carried += tree_ref.carried_traffic();
            occupied += tree_ref.occupied_capacity();
        }
        let layer = design.layer(link.layer()).expect("links live in existing layers");
        for demand in layer.demands() {
            if let Some(traffic) = design.demands[*demand].hop_by_hop_link_traffic().get(&link_id) {
                carried += *traffic;
                occupied += *traffic;
            }
        }
        if (carried - link.carried_traffic()).abs() > SUM_EPS {
            return fail(format!(
                "link {:?} caches carried traffic {}, recomputation says {}",
                link_id,
                link.carried_traffic(),
                carried
            ));
        }
        if (occupied - link.occupied_capacity()).abs() > SUM_EPS {
            return fail(format!(
                "link {:?} caches occupied capacity {}, recomputation says {}",
                link_id,
                link.occupied_capacity(),
                occupied
            ));
        }
    }

    for (demand_id, demand) in design.demands.iter() {
        if demand.routing_type() == RoutingType::SourceRouting {
            let carried: f64 = demand
                .routes()
                .iter()
                .filter(|r| !design.route_is_down(**r))
                .map(|r| design.routes[*r].carried_traffic())
                .sum();
            if (carried - demand.carried_traffic()).abs() > SUM_EPS {
                return fail(format!(
                    "demand {:?} caches carried traffic {}, its up routes carry {}",
                    demand_id,
                    demand.carried_traffic(),
                    carried
                ));
            }
        }
    }

    for (demand_id, link_id) in design.coupling_pairs() {
        let carried = design.demands[demand_id].carried_traffic();
        let capacity = design.links[link_id].capacity();
        if (carried - capacity).abs() > SUM_EPS {
            return fail(format!(
                "coupled link {:?} capacity {} does not follow demand {:?} carried traffic {}",
                link_id, capacity, demand_id, carried
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::demand::RoutingType;
    use crate::domain::element::PathElement;

    fn small_design() -> NetworkDesign {
        let mut design = NetworkDesign::new("small");
        let layer = design.default_layer();
        let a = design.add_node("A", 0.0, 0.0);
        let b = design.add_node("B", 1.0, 0.0);
        let ab = design.add_link(layer, a, b, 10.0, 1.0, 200_000.0).unwrap();
        let demand = design.add_demand(layer, a, b, 5.0, RoutingType::SourceRouting).unwrap();
        design.add_route(demand, 5.0, 5.0, vec![PathElement::Link(ab)]).unwrap();
        design
    }

    #[test]
    fn a_clean_design_passes() {
        check(&small_design()).unwrap();
    }

    #[test]
    fn a_one_sided_route_membership_is_fatal() {
        let mut design = small_design();
        // Reach into the cache and drop the demand's side of the
        // membership, as a buggy cascade would.
        let demand = design.layers[design.default_layer()].demands[0];
        design.demands[demand].routes.clear();
        assert!(matches!(check(&design), Err(Error::Inconsistency(_))));
    }

    #[test]
    fn a_stale_incidence_cache_is_fatal() {
        let mut design = small_design();
        let node = design.node_order[0];
        design.nodes[node].out_links.clear();
        assert!(matches!(check(&design), Err(Error::Inconsistency(_))));
    }

    #[test]
    fn a_drifted_traffic_cache_is_fatal() {
        let mut design = small_design();
        let link = design.layers[design.default_layer()].links[0];
        design.links[link].carried_traffic = 99.0;
        assert!(matches!(check(&design), Err(Error::Inconsistency(_))));
    }
}
