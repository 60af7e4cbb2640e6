// This is the entry point for the ledger node and its wallet helpers
use clap::Parser;
use fidelity_ledger::{
    build_blockchain, resolve_miner, ApiServer, Command, HttpTransport, LedgerConfig, Node, Opt,
    TransactionPayload, TransactionRequest, Wallet, PEER_TIMEOUT,
};
use log::{error, info, LevelFilter};
use std::process;
use std::sync::mpsc;
use std::sync::Arc;

fn main() {
    // Info by default; RUST_LOG still wins when set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            host,
            port,
            config,
            miner,
        } => {
            // defaults, then the file, then the environment, then my flags
            let mut config = LedgerConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if miner.is_some() {
                config.blockchain_address = miner;
            }
            config.validate()?;

            let (address, generated) = resolve_miner(&config)?;
            if let Some(wallet) = generated {
                println!("{}", wallet_json(&wallet)?);
            }
            let blockchain = Arc::new(build_blockchain(&config, &address)?);

            // The facade has to be up before the first scan so peers can find me
            let server = ApiServer::bind(&config.node_addr(), Arc::clone(&blockchain))?;
            info!("Node {} mining to {address}", config.node_addr());
            let node = Node::from_config(&config, blockchain)?;

            let (_keep_running, shutdown) = mpsc::channel();
            server.run(shutdown)?;
            node.shutdown();
        }
        Command::Createwallet => {
            let wallet = Wallet::generate()?;
            println!("{}", wallet_json(&wallet)?);
        }
        Command::Send {
            node,
            private_key,
            public_key,
            product,
            currency,
            value,
        } => {
            let wallet = Wallet::from_hex(&private_key, &public_key)?;
            let signature = wallet.sign(&TransactionPayload::new(
                product.as_str(),
                currency.as_str(),
                value,
            ))?;
            let request = TransactionRequest {
                sender_blockchain_address: wallet.address(),
                sender_public_key: wallet.public_key_hex(),
                signature: signature.to_hex(),
                product,
                currency,
                value,
            };
            HttpTransport::new(PEER_TIMEOUT)?.post_transaction(&node, &request)?;
            println!("Transaction from {} accepted by {node}", wallet.address());
        }
        Command::GetBalance { node, address } => {
            let amount = HttpTransport::new(PEER_TIMEOUT)?.fetch_balance(&node, &address)?;
            println!("Balance of {address}: {amount}");
        }
    }
    Ok(())
}

fn wallet_json(wallet: &Wallet) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "private_key": wallet.private_key_hex(),
        "public_key": wallet.public_key_hex(),
        "blockchain_address": wallet.address(),
    }))
}
