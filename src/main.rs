use clap::Parser;

use netdesign::domain::consistency;
use netdesign::domain::design::NetworkDesign;
use netdesign::{load_design, logger};

/// Loads a multilayer design snapshot, re-checks its consistency and
/// prints a per-layer report.
#[derive(Parser, Debug)]
#[command(name = "netdesign", version, about)]
struct Args {
    /// Path to the design snapshot (JSON).
    snapshot: String,

    /// Only run the consistency check, skip the report.
    #[arg(long)]
    check_only: bool,
}

fn main() {
    logger::init();

    let args = Args::parse();
    log::info!("Loading design from '{}'...", args.snapshot);

    let design = match load_design(&args.snapshot) {
        Ok(design) => design,
        Err(e) => {
            log::error!("Error loading design: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = consistency::check(&design) {
        log::error!("Design is inconsistent: {}", e);
        std::process::exit(2);
    }
    log::info!("Design '{}' is consistent.", design.name());

    if !args.check_only {
        print_report(&design);
    }
}

fn print_report(design: &NetworkDesign) {
    println!("Design '{}'", design.name());
    println!("  nodes: {}", design.node_ids().len());
    println!("  resources: {}", design.resource_ids().len());
    println!("  shared-risk groups: {}", design.srg_ids().len());
    println!("  coupling pairs: {}", design.coupling_pairs().len());

    for layer_id in design.layer_ids() {
        let layer = design.layer(*layer_id).expect("listed layers exist");
        let default_marker = if *layer_id == design.default_layer() { " (default)" } else { "" };
        println!("  layer '{}'{}", layer.name(), default_marker);
        println!("    links: {}", layer.links().len());
        println!("    demands: {}", layer.demands().len());
        println!("    multicast demands: {}", layer.multicast_demands().len());
        println!("    routes: {}", layer.routes().len());
        println!("    multicast trees: {}", layer.trees().len());

        let blocked = design.blocked_traffic(*layer_id);
        if blocked > 0.0 {
            println!("    blocked traffic: {:.3}", blocked);
        }
        let oversubscribed = design.oversubscribed_links(*layer_id);
        if !oversubscribed.is_empty() {
            println!("    oversubscribed links: {}", oversubscribed.len());
        }
    }
}
