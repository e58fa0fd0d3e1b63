//! Chatlens CLI binary.
//!
//! Debugging reverse proxy for chat-completion APIs.
//!
//! # Commands
//!
//! - `proxy` - Run the proxy and print the live transcript
//! - `config` - Print the effective configuration
//! - `check` - Report whether a path would be collapsed

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use chatlens::{transcript::console::spawn_console_printer, Config, ProxyServer, VERSION};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatlens")]
#[command(version = VERSION)]
#[command(about = "Chatlens - debugging proxy for chat-completion APIs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy and print the live transcript
    Proxy(ProxyArgs),

    /// Print the effective configuration as TOML
    Config {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Report whether a request path would be collapsed
    Check {
        /// Request path, e.g. /users/42
        path: String,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ProxyArgs {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Upstream API base URL
    #[arg(short, long)]
    upstream: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transcript entries kept in memory
    #[arg(long)]
    history: Option<usize>,

    /// Print the transcript without colors
    #[arg(long)]
    no_color: bool,

    /// Do not print the transcript
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit operational logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Proxy(args) => cmd_proxy(args),
        Commands::Config { config } => cmd_config(config),
        Commands::Check { path, config } => cmd_check(&path, config),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Operational logs go to stderr; stdout carries the transcript.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn effective_config(path: Option<&PathBuf>) -> Config {
    Config::load(path.map(PathBuf::as_path)).with_env_overrides()
}

fn cmd_proxy(args: ProxyArgs) -> anyhow::Result<()> {
    let ProxyArgs {
        port,
        host,
        upstream,
        config: config_path,
        history,
        no_color,
        quiet,
        verbose,
        log_json,
    } = args;

    init_logging(verbose, log_json);

    let mut config = effective_config(config_path.as_ref());
    if let Some(port) = port {
        config.proxy.port = port;
    }
    if let Some(host) = host {
        config.proxy.host = host;
    }
    if let Some(upstream) = upstream {
        config.proxy.upstream = upstream;
    }
    if let Some(history) = history {
        config.history.max_entries = history;
    }

    let color =
        !no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();

    // One thread multiplexes every client and upstream connection.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Arc::new(ProxyServer::new(config.proxy_config())?);

        let _printer = (!quiet).then(|| spawn_console_printer(&server.sink(), color));

        println!("Chatlens {VERSION}");
        println!("  Listening:  http://{}", config.proxy.listen_addr());
        println!("  Forwarding: {}", server.upstream());
        println!();

        #[cfg(unix)]
        spawn_reload_on_hangup(Arc::clone(&server), config_path)?;
        #[cfg(not(unix))]
        drop(config_path);

        let mut runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        tokio::select! {
            result = &mut runner => result??,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                server.shutdown();
                runner.await??;
            }
        }

        eprintln!();
        eprintln!("Session Statistics:");
        eprintln!("{}", serde_json::to_string_pretty(&server.stats())?);
        Ok::<(), anyhow::Error>(())
    })
}

/// Re-read collapse patterns from the config file on SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(server: Arc<ProxyServer>, path: Option<PathBuf>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            let config = Config::load(path.as_deref());
            if config.responses.collapsed_patterns.is_empty() {
                warn!("Reloaded configuration has no collapse patterns");
            }
            server.reload_patterns(config.responses.collapsed_patterns);
        }
    });
    Ok(())
}

fn cmd_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = effective_config(path.as_ref());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_check(path: &str, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = effective_config(config.as_ref());
    match config.responses.collapsed_patterns.matching(path) {
        Some(pattern) => println!("{path}: collapsed (matches {pattern})"),
        None => println!("{path}: not collapsed"),
    }
    Ok(())
}
