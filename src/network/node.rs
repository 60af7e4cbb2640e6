// A running ledger node: the ledger, its neighbor scanner, and the two
// background loops that keep them busy. The HTTP facade is started
// separately so tests can bind it to any port.

use crate::config::LedgerConfig;
use crate::core::Blockchain;
use crate::error::Result;
use crate::network::discovery::NeighborScanner;
use crate::network::transport::HttpTransport;
use crate::wallet::Wallet;
use log::{info, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Address mining rewards go to, and the wallet behind it when one had to
/// be generated.
pub fn resolve_miner(config: &LedgerConfig) -> Result<(String, Option<Wallet>)> {
    match &config.blockchain_address {
        Some(address) => Ok((address.clone(), None)),
        None => {
            let wallet = Wallet::generate()?;
            info!("No mining address configured, generated {}", wallet.address());
            Ok((wallet.address(), Some(wallet)))
        }
    }
}

/// Builds a ledger wired to real peers from `config`.
pub fn build_blockchain(config: &LedgerConfig, blockchain_address: &str) -> Result<Blockchain> {
    config.validate()?;
    let transport = Arc::new(HttpTransport::new(config.peer_timeout())?);
    Ok(Blockchain::new(blockchain_address, transport)?
        .with_difficulty(config.difficulty)
        .with_mining_reward(config.mining_reward))
}

pub fn build_scanner(config: &LedgerConfig) -> NeighborScanner {
    NeighborScanner::new(config.host.as_str(), config.port)
        .with_port_range(config.port_range())
        .with_ip_range(config.ip_range())
        .with_probe_timeout(config.probe_timeout())
}

pub struct Node {
    blockchain: Arc<Blockchain>,
    loops: Vec<(Sender<()>, JoinHandle<()>)>,
}

impl Node {
    /// Scans for neighbors, syncs with them, mines once, and then keeps
    /// discovery and mining running on their intervals until shutdown.
    pub fn start(
        blockchain: Arc<Blockchain>,
        scanner: NeighborScanner,
        mining_interval: Duration,
        neighbor_sync_interval: Duration,
    ) -> Result<Node> {
        let scanner = Arc::new(scanner);
        refresh_neighbors(&blockchain, &scanner);
        blockchain.resolve_conflicts();
        let started = Instant::now();
        mine_once(&blockchain);
        let first_mining_wait = mining_interval.saturating_sub(started.elapsed());

        let discovery = {
            let blockchain = Arc::clone(&blockchain);
            let scanner = Arc::clone(&scanner);
            spawn_loop(
                "neighbor-discovery",
                neighbor_sync_interval,
                neighbor_sync_interval,
                move || refresh_neighbors(&blockchain, &scanner),
            )?
        };
        let mining = {
            let blockchain = Arc::clone(&blockchain);
            spawn_loop("mining", mining_interval, first_mining_wait, move || {
                mine_once(&blockchain)
            })?
        };

        Ok(Node {
            blockchain,
            loops: vec![discovery, mining],
        })
    }

    pub fn from_config(config: &LedgerConfig, blockchain: Arc<Blockchain>) -> Result<Node> {
        Node::start(
            blockchain,
            build_scanner(config),
            config.mining_interval(),
            config.neighbor_sync_interval(),
        )
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    /// Stops both loops and waits for them. A mining cycle in progress is
    /// allowed to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        for (sender, _) in &self.loops {
            let _ = sender.send(());
        }
        for (_, thread) in self.loops.drain(..) {
            let _ = thread.join();
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}

fn refresh_neighbors(blockchain: &Blockchain, scanner: &NeighborScanner) {
    let found = scanner.scan();
    blockchain.get_neighbors().replace(found);
}

fn mine_once(blockchain: &Blockchain) {
    if let Err(e) = blockchain.mine() {
        warn!("Mining cycle failed: {e}");
    }
}

// Runs `tick` every `interval`, measured from the start of the previous tick,
// so a tick longer than the interval is followed immediately by the next.
fn spawn_loop(
    name: &str,
    interval: Duration,
    first_wait: Duration,
    mut tick: impl FnMut() + Send + 'static,
) -> Result<(Sender<()>, JoinHandle<()>)> {
    let (sender, receiver) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut wait = first_wait;
            loop {
                match receiver.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let started = Instant::now();
                tick();
                wait = interval.saturating_sub(started.elapsed());
            }
        })?;
    Ok((sender, thread))
}
