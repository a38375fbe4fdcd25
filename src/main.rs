use std::path::Path;
use std::process::ExitCode;

use docmerge::config::{self, settings::Settings};
use docmerge::server::{AppState, build_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "docmerge=info,tower_http=info";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("docmerge {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    if args.len() > 1 || args.iter().any(|a| a.starts_with('-')) {
        print_usage();
        return ExitCode::FAILURE;
    }

    let settings = match config::load_settings(args.first().map(Path::new)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR: Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("Usage: docmerge [settings.yaml]");
    eprintln!("  Serve the PDF merge/combine/optimize HTTP API.");
    eprintln!(
        "  Without an argument, ${} or ./settings.yaml is used if present.",
        config::CONFIG_ENV
    );
}

async fn serve(settings: Settings) -> std::io::Result<()> {
    let addr = settings.bind_addr.clone();
    info!(
        storage_dir = %settings.storage_dir.display(),
        param_policy = ?settings.param_policy,
        "starting docmerge"
    );
    let app = build_router(AppState::new(settings));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
