//! Runs the two-leaf profile from the original HTB example for 100 ticks
//! and prints the same stats lines the Python example prints, plus the
//! topology snapshot a renderer would consume. Graph rendering itself is
//! out of scope for this crate.

use htb_sim::{Profile, Simulation};

const SIM_SECONDS: f64 = 0.1; // 100 ticks at REPLENISH_INTERVAL = 0.001s

fn main() {
    tracing_subscriber::fmt::init();

    let profile = Profile::inner(
        "Root",
        25_000_000.0,
        25_000_000.0,
        vec![
            Profile::leaf("S1", 12_000_000.0, 25_000_000.0, 1, 30_000_000.0),
            Profile::leaf("S2", 3_000_000.0, 25_000_000.0, 1, 30_000_000.0),
        ],
    );

    let mut sim = Simulation::with_seed(&profile, 0xC0FFEE).expect("valid profile");
    sim.run(SIM_SECONDS).expect("simulation runs to completion");

    println!("[Profile]");
    let mut leaves: Vec<_> = sim.leaves().iter().collect();
    leaves.sort_by_key(|leaf| leaf.name().to_string());
    for leaf in leaves {
        println!("{leaf}");
        println!("{}", leaf.source());
        println!("{}", leaf.sink());
    }
    println!();

    println!("[Topology]");
    let topology = sim.topology();
    let name_of = |id: htb_sim::NodeId| {
        topology
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.name.as_str())
            .unwrap_or("?")
    };
    for node in &topology {
        let parent = node.parent.map(name_of).unwrap_or("-");
        println!(
            "{} (rate={}, ceil={}) parent={}",
            node.name, node.rate, node.ceil, parent
        );
    }
}
