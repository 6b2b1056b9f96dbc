//! RelayKV - A Single-Writer In-Memory Key-Value Cache Server
//!
//! Main entry point: parses flags, wires the store, work queue, executor
//! and expirer together, and accepts connections until shutdown.

use relaykv::connection::{handle_connection, ConnectionStats};
use relaykv::storage::{Expirer, ExpirerConfig, Store};
use relaykv::{executor, queue};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// How long shutdown waits for the executor to drain the queue.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Capacity of the bounded work queue
    queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: relaykv::DEFAULT_HOST.to_string(),
            port: relaykv::DEFAULT_PORT,
            queue_capacity: queue::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--queue-capacity" | "-q" => {
                    if i + 1 < args.len() {
                        config.queue_capacity = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid queue capacity");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --queue-capacity requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("RelayKV version {}", relaykv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
RelayKV - A Single-Writer In-Memory Key-Value Cache Server

USAGE:
    relaykv [OPTIONS]

OPTIONS:
    -h, --host <HOST>             Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>             Port to listen on (default: 6379)
    -q, --queue-capacity <N>      Work queue capacity (default: 100)
    -v, --version                 Print version information
        --help                    Print this help message

EXAMPLES:
    relaykv                       # Start on 127.0.0.1:6379
    relaykv --port 6380           # Start on port 6380
    relaykv --host 0.0.0.0        # Listen on all interfaces

CONNECTING:
    Use redis-cli or any RESP client:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET session token ex 60
    OK
    127.0.0.1:6379> GET session
    "token"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"

        ███████████            ████                       █████   ████ █████   █████
       ░░███░░░░░███          ░░███                      ░░███   ███░ ░░███   ░░███
        ░███    ░███   ██████  ░███   ██████   █████ ████ ░███  ███    ░███    ░███
        ░██████████   ███░░███ ░███  ░░░░░███ ░░███ ░███  ░███████     ░███    ░███
        ░███░░░░░███ ░███████  ░███   ███████  ░███ ░███  ░███░░███    ░░███   ███
        ░███    ░███ ░███░░░   ░███  ███░░███  ░███ ░███  ░███ ░░███    ░░░█████░
        █████   █████░░██████  █████░░████████ ░░███████  █████ ░░████    ░░███
       ░░░░░   ░░░░░  ░░░░░░  ░░░░░  ░░░░░░░░   ░░░░░███ ░░░░░   ░░░░      ░░░
                                                ███ ░███
                                               ░░██████
                                                ░░░░░░

RelayKV v{} - Single-Writer In-Memory Key-Value Cache Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        relaykv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Set up logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    print_banner(&config);

    // The store is handed to the executor; the expirer only gets a handle
    // to the expiration map and the producer half of the queue.
    let store = Store::new();
    let expiry_index = store.expiry_index();
    let (tx, rx) = queue::bounded(config.queue_capacity);
    info!(capacity = config.queue_capacity, "work queue created");

    let executor = tokio::spawn(executor::run(store, rx));

    let expirer = Expirer::start(expiry_index, tx.clone(), ExpirerConfig::default());

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("listening on {}", config.bind_address());

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, tx, stats) => {}
        _ = shutdown => {}
    }

    // Close the queue: the expirer stops, the accept loop's sender is
    // already gone, and the executor drains whatever is still enqueued.
    drop(expirer);
    match tokio::time::timeout(DRAIN_TIMEOUT, executor).await {
        Ok(Ok(())) => info!("server shutdown complete"),
        Ok(Err(e)) => error!(error = %e, "executor task failed"),
        Err(_) => warn!("executor did not drain within {DRAIN_TIMEOUT:?}, exiting anyway"),
    }

    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, tx: queue::WorkSender, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let queue = tx.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, queue, stats).await;
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}
