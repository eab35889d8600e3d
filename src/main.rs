use distributed_cache::config::Config;
use distributed_cache::node::server::Node;

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} --request <addr:port> --publish <addr:port> --api <addr:port> [--node <peer-request-addr>]",
        program
    );
    eprintln!(
        "Example: {} --request 127.0.0.1:5000 --publish 127.0.0.1:5001 --api 127.0.0.1:5002",
        program
    );
    eprintln!(
        "Example: {} --request 127.0.0.1:6000 --publish 127.0.0.1:6001 --api 127.0.0.1:6002 --node 127.0.0.1:5000",
        program
    );
    eprintln!();
    eprintln!("Configuration via environment variables:");
    eprintln!("  MAX_SIZE, REPLICAS, REDUNDANCY,");
    eprintln!("  PUBLISH_INTERVAL_MS, PEER_EXPIRY_MS, REQUEST_DEADLINE_MS");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut request_addr: Option<String> = None;
    let mut publish_addr: Option<String> = None;
    let mut api_addr: Option<String> = None;
    let mut join_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--request" => {
                request_addr = args.get(i + 1).cloned();
                i += 2;
            }
            "--publish" => {
                publish_addr = args.get(i + 1).cloned();
                i += 2;
            }
            "--api" => {
                api_addr = args.get(i + 1).cloned();
                i += 2;
            }
            "--node" => {
                join_addr = args.get(i + 1).cloned();
                i += 2;
            }
            "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }

    let (Some(request_addr), Some(publish_addr), Some(api_addr)) =
        (request_addr, publish_addr, api_addr)
    else {
        print_usage(&args[0]);
        std::process::exit(1);
    };

    let config = Config::from_env();
    tracing::info!(
        "starting node: requests {} publish {} api {}",
        request_addr,
        publish_addr,
        api_addr
    );
    if let Some(join_addr) = &join_addr {
        tracing::info!("joining via {}", join_addr);
    } else {
        tracing::info!("starting a new cluster");
    }

    let node = Node::start(
        config,
        &request_addr,
        &publish_addr,
        &api_addr,
        join_addr.as_deref(),
    )
    .await?;

    tracing::info!("node {} ready", node.node_id());
    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    node.shutdown();

    Ok(())
}
