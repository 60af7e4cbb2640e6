// The HTTP facade every ledger node serves. Wallets submit transactions here
// and neighbors use the same routes for gossip and chain fetching.
// A fixed set of worker threads shares one listener and each serves one
// request at a time. Consensus rounds run off the workers, on the ledger's
// own background thread.

use crate::core::{Blockchain, TransactionRequest};
use crate::error::{BlockchainError, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Requests served concurrently unless configured otherwise
pub const DEFAULT_WORKERS: usize = 8;

/// Body of `GET /amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountResponse {
    pub recipient: String,
    pub amount: f32,
}

/// Body of every 400 answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Status code and JSON body produced by routing one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<String>,
}

impl ApiResponse {
    fn empty(status: u16) -> ApiResponse {
        ApiResponse { status, body: None }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> ApiResponse {
        match serde_json::to_string(value) {
            Ok(body) => ApiResponse {
                status,
                body: Some(body),
            },
            Err(e) => ApiResponse::error(500, e.to_string()),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> ApiResponse {
        let body = ErrorResponse {
            error: message.into(),
        };
        ApiResponse {
            status,
            body: serde_json::to_string(&body).ok(),
        }
    }
}

/// Maps one request onto a ledger operation.
pub fn route(blockchain: &Arc<Blockchain>, method: &Method, url: &str, body: &str) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    match (method, path) {
        (Method::Get, "/chain") => ApiResponse::json(200, &blockchain.snapshot()),
        (Method::Get, "/amount") => {
            let address = url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "blockchain_address")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            let amount = blockchain.get_balance(&address);
            ApiResponse::json(
                200,
                &AmountResponse {
                    recipient: address,
                    amount,
                },
            )
        }
        (Method::Post, "/transactions") => match parse_request(body) {
            Ok(request) => match blockchain.relay_transaction(&request) {
                Ok(()) => ApiResponse::empty(201),
                Err(e) => ApiResponse::error(400, e.to_string()),
            },
            Err(e) => ApiResponse::error(400, e.to_string()),
        },
        (Method::Put, "/transactions") => match parse_request(body) {
            Ok(request) => match blockchain.submit_transaction(&request) {
                Ok(()) => ApiResponse::empty(201),
                Err(e) => ApiResponse::error(400, e.to_string()),
            },
            Err(e) => ApiResponse::error(400, e.to_string()),
        },
        (Method::Delete, "/transactions") => {
            blockchain.clear_pool();
            ApiResponse::empty(202)
        }
        (Method::Put, "/consensus") => {
            blockchain.request_consensus();
            ApiResponse::empty(202)
        }
        _ => ApiResponse::error(404, format!("no route for {method} {path}")),
    }
}

fn parse_request(body: &str) -> Result<TransactionRequest> {
    serde_json::from_str(body).map_err(|e| BlockchainError::Serialization(e.to_string()))
}

/// A bound HTTP facade that has not started accepting yet.
pub struct ApiServer {
    server: Arc<Server>,
    blockchain: Arc<Blockchain>,
    workers: usize,
}

impl ApiServer {
    pub fn bind(addr: &str, blockchain: Arc<Blockchain>) -> Result<ApiServer> {
        let server = Server::http(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        Ok(ApiServer {
            server: Arc::new(server),
            blockchain,
            workers: DEFAULT_WORKERS,
        })
    }

    /// Sets how many requests are served at once (at least one).
    pub fn with_workers(mut self, workers: usize) -> ApiServer {
        self.workers = workers.max(1);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server
            .server_addr()
            .to_ip()
            .ok_or_else(|| BlockchainError::Network("Server is not bound to an IP".to_string()))
    }

    /// Serves requests until `shutdown` fires or its sender is dropped, then
    /// waits for the workers to finish their current request.
    pub fn run(self, shutdown: Receiver<()>) -> Result<()> {
        let addr = self.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let server = Arc::clone(&self.server);
            let blockchain = Arc::clone(&self.blockchain);
            let worker_stop = Arc::clone(&stop);
            let spawned = thread::Builder::new()
                .name(format!("http-{addr}-{id}"))
                .spawn(move || accept_loop(&server, &blockchain, &worker_stop));
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    stop.store(true, Ordering::SeqCst);
                    join_all(workers);
                    return Err(e.into());
                }
            }
        }
        info!("HTTP facade listening on {addr} with {} workers", workers.len());

        let _ = shutdown.recv();
        stop.store(true, Ordering::SeqCst);
        join_all(workers);
        info!("HTTP facade shut down");
        Ok(())
    }

    /// Runs the facade on a background thread.
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr()?;
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("http-{addr}"))
            .spawn(move || {
                if let Err(e) = self.run(receiver) {
                    error!("HTTP facade on {addr} failed: {e}");
                }
            })?;
        Ok(ServerHandle {
            addr,
            shutdown: Some(sender),
            thread: Some(thread),
        })
    }
}

fn accept_loop(server: &Server, blockchain: &Arc<Blockchain>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
            Ok(Some(request)) => serve(blockchain, request),
            Ok(None) => {}
            Err(e) => {
                error!("HTTP worker stopped accepting: {e}");
                break;
            }
        }
    }
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        let _ = worker.join();
    }
}

/// Owner of a running facade. Dropping it stops the accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(blockchain: &Arc<Blockchain>, mut request: Request) {
    let mut body = String::new();
    let response = match request.as_reader().read_to_string(&mut body) {
        Ok(_) => route(blockchain, request.method(), request.url(), &body),
        Err(e) => ApiResponse::error(400, format!("unreadable body: {e}")),
    };
    debug!(
        "{} {} -> {}",
        request.method(),
        request.url(),
        response.status
    );

    let result = match response.body {
        Some(body) => {
            let mut reply = Response::from_string(body).with_status_code(response.status);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
                reply = reply.with_header(header);
            }
            request.respond(reply)
        }
        None => request.respond(Response::empty(response.status)),
    };
    if let Err(e) = result {
        error!("Failed to answer request: {e}");
    }
}
