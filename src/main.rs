use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use job_worker::auth::AccessPolicy;
use job_worker::config::{LauncherConfig, ServerConfig, TlsConfig};
use job_worker::server::Server;
use job_worker::shutdown::install_shutdown_handler;
use job_worker::tls::TlsIdentity;

#[derive(Parser, Debug)]
#[command(name = "job-worker")]
#[command(version)]
#[command(about = "Runs processes on request and serves their status and output over HTTPS")]
struct Args {
    /// Address to bind the API listener to
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port for the API listener
    #[arg(long, default_value = "8080")]
    port: u16,

    // === TLS Options ===
    /// Path to the server certificate chain (PEM format)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Path to the server private key (PEM format)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Serve plaintext HTTP if the certificate or key is missing or cannot
    /// be loaded. Useful for development. NOT recommended for production.
    #[arg(long)]
    insecure: bool,

    // === Job Options ===
    /// JSON file mapping bearer tokens to roles (admin, operator, viewer).
    /// Built-in development tokens are used when omitted.
    #[arg(long)]
    tokens: Option<PathBuf>,

    /// Milliseconds a stopped job gets between SIGTERM and SIGKILL
    #[arg(long, default_value = "2000")]
    stop_grace_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig {
        listen_addr: SocketAddr::new(args.bind, args.port),
        tls: TlsConfig {
            enabled: true,
            cert_path: args.cert,
            key_path: args.key,
            allow_insecure: args.insecure,
        },
        launcher: LauncherConfig {
            stop_grace_period_ms: args.stop_grace_ms,
        },
        tokens_path: args.tokens,
    };

    let tls_identity = TlsIdentity::resolve(&config.tls)
        .await
        .map_err(|e| format!("{} (use --insecure for development)", e))?;

    let policy = match &config.tokens_path {
        Some(path) => AccessPolicy::from_json_file(path)?,
        None => {
            tracing::warn!("No token file given, using built-in development tokens");
            AccessPolicy::default()
        }
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        tls_enabled = tls_identity.is_some(),
        tokens = policy.len(),
        stop_grace_ms = config.launcher.stop_grace_period_ms,
        "Starting job-worker"
    );

    let shutdown = install_shutdown_handler();
    Server::new(config, policy).run(tls_identity, shutdown).await?;

    Ok(())
}
