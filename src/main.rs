mod bus;
mod config;
mod forwarding;
mod logging;
mod model;
mod node;
mod operator;
mod routing;
mod shared;
mod transport;

use clap::Parser;
use tracing::{error, info};

use config::Args;
use node::Node;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing();

    if let Err(err) = run(args) {
        error!(%err, "overlayd exiting on error");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let node_id = args.parsed_node_id()?;
    let algorithm = args.parsed_algorithm()?;

    let topo_path = args.config_dir.join("topo.txt");
    let names_path = args.config_dir.join("id_nodos.txt");
    let topology = config::load_topology(&topo_path);
    let names = config::load_names(&names_path);

    info!(node_id, algorithm = algorithm.as_str(), "starting overlayd");

    let node = Node::new(node_id, algorithm, &topology, names, &args.log_dir)?;
    node.run()
}
