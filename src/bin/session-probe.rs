//! Session Probe CLI.
//!
//! Inspects the network registry and queries balances straight from a
//! network's public RPC endpoint, without a wallet agent.
//!
//! Usage:
//!   cargo run --bin session-probe -- networks
//!   cargo run --bin session-probe -- balance --network "Moonbase Alpha" --address 0x...
//!
//! `WALLET_SESSION_RPC_URL` overrides the endpoint of the selected network.

use std::env;
use std::sync::Arc;

use wallet_session::logging::init_logging;
use wallet_session::{Address, BalanceService, HttpRpcClient, NetworkRegistry, SessionConfig};

fn usage() -> ! {
    eprintln!("Usage: session-probe networks");
    eprintln!("       session-probe balance --network \"<name>\" --address <0x...>");
    std::process::exit(1);
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    let config = SessionConfig::from_env();
    let registry = NetworkRegistry::moonbeam().with_supported(config.supported_networks.clone());

    match args.get(1).map(String::as_str) {
        Some("networks") => list_networks(&registry),
        Some("balance") => {
            let mut network_name = config.default_network.clone();
            let mut address = String::new();

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--network" => {
                        if i + 1 < args.len() {
                            network_name = args[i + 1].clone();
                            i += 1;
                        }
                    }
                    "--address" => {
                        if i + 1 < args.len() {
                            address = args[i + 1].clone();
                            i += 1;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }

            if address.is_empty() {
                usage();
            }
            query_balance(&registry, &network_name, &address);
        }
        _ => usage(),
    }
}

fn list_networks(registry: &NetworkRegistry) {
    for network in registry.networks() {
        let marker = if registry.is_supported(&network.name) { "*" } else { " " };
        println!(
            "{} {:<16} chain {:>5} ({})  {}",
            marker,
            network.name,
            network.chain_id,
            network.chain_id_hex(),
            network.rpc_url
        );
    }
    println!("* offered to users");
}

fn query_balance(registry: &NetworkRegistry, network_name: &str, address: &str) {
    let Some(network) = registry.resolve_by_name(network_name) else {
        eprintln!("Unknown network: {}", network_name);
        std::process::exit(1);
    };
    let mut network = network.clone();
    if let Ok(url) = env::var("WALLET_SESSION_RPC_URL") {
        network.rpc_url = url;
    }

    let address = match Address::parse(address) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let balances = BalanceService::new(Arc::new(HttpRpcClient::new()));
    match runtime.block_on(balances.fetch(Some(&address), &network)) {
        Ok(display) => println!("{} {} on {}", display, network.currency.symbol, network.name),
        Err(e) => {
            eprintln!("Balance lookup failed: {}", e);
            std::process::exit(1);
        }
    }
}
