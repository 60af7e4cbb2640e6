use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fidelity-ledger")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node and its HTTP facade")]
    StartNode {
        #[arg(long, help = "Host to listen on and scan neighbors around")]
        host: Option<String>,
        #[arg(long, help = "Port to listen on")]
        port: Option<u16>,
        #[arg(long, help = "TOML configuration file")]
        config: Option<PathBuf>,
        #[arg(long, help = "Send mining rewards to ADDRESS")]
        miner: Option<String>,
    },
    #[command(name = "createwallet", about = "Create a new key pair and address")]
    Createwallet,
    #[command(name = "send", about = "Sign a transaction and submit it to a node")]
    Send {
        #[arg(long, help = "Node to submit to, as HOST:PORT")]
        node: String,
        #[arg(long = "private-key", help = "Hex private key of the sender")]
        private_key: String,
        #[arg(long = "public-key", help = "Hex public key (X || Y) of the sender")]
        public_key: String,
        #[arg(long, help = "Product the transaction pays for")]
        product: String,
        #[arg(long, help = "Currency code; anything but FC is converted 10:1")]
        currency: String,
        #[arg(long, help = "Value in the given currency")]
        value: f32,
    },
    #[command(
        name = "getbalance",
        about = "Get the committed balance of an address from a node"
    )]
    GetBalance {
        #[arg(long, help = "Node to ask, as HOST:PORT")]
        node: String,
        #[arg(help = "The wallet address")]
        address: String,
    },
}
