//! Portcullis: a small HTTP service with proxy-aware client IP resolution
//! and per-client fixed-window rate limiting.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "utoipa")]
use axum::Json;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
#[cfg(feature = "utoipa")]
use utoipa_scalar::{Scalar, Servable};

mod client_ip;
mod config;
mod middleware;
mod observability;
mod openapi;
mod rate_limit;
mod routes;
#[cfg(test)]
mod tests_support;

use client_ip::TrustedPeers;
use config::AppConfig;
use rate_limit::PartitionStore;

#[derive(Parser, Debug)]
#[command(version, about = "Portcullis rate-limited API service", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./portcullis.toml when present,
    /// built-in defaults otherwise)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Export the OpenAPI specification as JSON
    Openapi {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Write a commented default configuration file
    Init {
        /// Where to write the file (defaults to ./portcullis.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<PartitionStore>,
    /// Peer ranges whose proxy headers the classifier believes.
    pub trusted_peers: Arc<TrustedPeers>,
    /// Process start, reported as uptime by the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let trusted = &config.server.trusted_peers;
        let trusted_peers =
            TrustedPeers::new(trusted.parsed_cidrs(), trusted.dangerously_trust_all);
        let rate_limiter = PartitionStore::new(&config.limits.rate_limit);

        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
            trusted_peers: Arc::new(trusted_peers),
            started_at: Instant::now(),
        }
    }
}

/// Assemble the application router.
pub fn build_app(config: &AppConfig, state: AppState) -> Router {
    let rate_limited = Router::new()
        .route("/weatherforecast", get(routes::forecast::get_weather_forecast))
        .route("/diagnostics/client-ip", get(routes::diagnostics::client_ip_report))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(rate_limited);

    #[cfg(feature = "utoipa")]
    let app = app
        .route("/openapi.json", get(openapi_json))
        .merge(Scalar::with_url("/api/docs", openapi::ApiDoc::build()));

    app.layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}

/// Returns the OpenAPI spec as JSON.
#[cfg(feature = "utoipa")]
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::build())
}

/// Commented default configuration, written by `portcullis init`.
fn default_config_toml() -> &'static str {
    r#"# Portcullis configuration
# All keys are optional; the values shown are the defaults.

[server]
host = "0.0.0.0"
port = 8080
# body_limit_bytes = 2097152

# Peers allowed to speak for the client via X-Real-IP / X-Forwarded-For.
# The default covers loopback only, the shape of a reverse proxy running
# on the same host.
#[server.trusted_peers]
#cidrs = ["127.0.0.0/8", "::1/128"]

[limits.rate_limit]
enabled = true
limit = 1
window_secs = 60
# max_partitions = 100000
# sweep_batch_size = 1024

[observability.logging]
level = "info"     # trace | debug | info | warn | error
format = "compact" # pretty | compact | json
# timestamps = true
# file_line = false
# filter = "tower_http=debug"
"#
}

/// Resolve the config path: an explicit `--config` must exist, otherwise
/// `./portcullis.toml` is used when present, and built-in defaults when not.
fn resolve_config_path(explicit_path: Option<&str>) -> Result<Option<PathBuf>, String> {
    if let Some(path) = explicit_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path));
    }

    let cwd_config = PathBuf::from("portcullis.toml");
    if cwd_config.exists() {
        return Ok(Some(cwd_config));
    }

    Ok(None)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Openapi { output }) => {
            #[cfg(feature = "utoipa")]
            run_openapi_export(output);
            #[cfg(not(feature = "utoipa"))]
            {
                let _ = output;
                eprintln!("Error: this binary was built without the 'utoipa' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

async fn run_server(explicit_config_path: Option<&str>) {
    let config_path = match resolve_config_path(explicit_config_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let config = match &config_path {
        Some(path) => match AppConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    observability::init_tracing(&config.observability.logging)
        .expect("Failed to initialize tracing");

    match &config_path {
        Some(path) => tracing::info!(config_file = %path.display(), "Starting portcullis"),
        None => tracing::info!("Starting portcullis with built-in default configuration"),
    }

    if config.server.trusted_peers.dangerously_trust_all {
        tracing::warn!(
            "SECURITY RISK: trusted_peers.dangerously_trust_all is enabled. Any client can \
             pick its own rate-limit identity via X-Real-IP or X-Forwarded-For."
        );
    }
    if !config.limits.rate_limit.enabled {
        tracing::warn!("Rate limiting is disabled; every request will be admitted");
    }

    let state = AppState::new(config.clone());
    let app = build_app(&config, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

/// Write a commented default configuration file.
fn run_init(output: Option<String>, force: bool) {
    let output_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("portcullis.toml"));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To start the server, run:");
    println!("  portcullis serve --config {}", output_path.display());
}

/// Export the OpenAPI spec to a file or stdout.
#[cfg(feature = "utoipa")]
fn run_openapi_export(output: Option<String>) {
    let spec = openapi::ApiDoc::build();
    let json = serde_json::to_string_pretty(&spec).expect("Failed to serialize OpenAPI spec");

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &json) {
                eprintln!("Failed to write {}: {}", path, e);
                std::process::exit(1);
            }
            println!("OpenAPI spec written to {}", path);
        }
        None => println!("{}", json),
    }
}
