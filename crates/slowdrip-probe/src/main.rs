use clap::Parser;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use slowdrip_common::{Config, LoggingConfig};
use slowdrip_probe::{metrics, Orchestrator, SessionSettings};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_PATH: &str = "config/slowdrip.yaml";

/// Hold connections open against the target by trickling an HTTP header one
/// byte at a time. The target host comes from `TARGET_IP` (port 3333).
#[derive(Debug, Parser)]
#[command(name = "slowdrip", version)]
struct Cli {
    /// Number of concurrent connections to open.
    workers: NonZeroUsize,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn metrics_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    match req.uri().path() {
        "/health" => Ok(Response::new(Body::from("OK"))),
        "/metrics" => Ok(Response::new(Body::from(metrics::render_metrics()))),
        _ => {
            let mut not_found = Response::new(Body::from("Not Found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

async fn run_metrics_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Could not bind metrics server");
            return;
        }
    };

    info!(port = port, "Metrics server online");

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server failed");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load_or_default(CONFIG_PATH)?.with_env_overrides();
    init_logging(&config.logging);

    metrics::register_metrics();
    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            run_metrics_server(port).await;
        });
    }

    let master_token = CancellationToken::new();
    let orchestrator = Orchestrator::new(config.target(), SessionSettings::from(&config.probe))
        .with_cancellation(master_token.clone());

    let signal_token = master_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received, closing probe connections");
                signal_token.cancel();
            }
            _ = signal_token.cancelled() => {}
        }
    });

    info!(
        target_addr = %orchestrator.target(),
        workers = cli.workers.get(),
        "Slowdrip probe started"
    );

    let outcome = orchestrator.run(cli.workers).await;
    master_token.cancel();

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %e, "Probe run failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
