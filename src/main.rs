use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tlsnet::{HttpMessage, Locator, NetConfig, RequestArgs};

#[derive(Parser)]
#[command(name = "tlsnet", version, about = "HTTP/1.1 over TLS")]
struct Cli {
    /// TOML file overriding the default configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve files from a directory
    Serve {
        /// Address to bind, e.g. https://localhost:8443/
        locator: Locator,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Fetch a locator and print the response body
    Get { locator: Locator },
}

#[async_std::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tlsnet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        if tlsnet::set_config(NetConfig::from_file(path)).is_err() {
            tracing::warn!(path = %path.display(), "configuration already installed, keeping it");
        }
    }

    match cli.command {
        Command::Serve { locator, root } => {
            tracing::info!(%locator, root = %root.display(), "serving files");
            let handle = tlsnet::listen(&locator, move |request: HttpMessage| serve_file(&root, request)).await?;
            handle.await;
            Ok(ExitCode::FAILURE)
        }
        Command::Get { locator } => {
            let response = tlsnet::request(&locator, RequestArgs::new()).await?;
            eprintln!("{} {}", response.code, tlsnet::http::status::reason(response.code));
            println!("{}", response.text());
            Ok(if response.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn serve_file(root: &Path, request: HttpMessage) -> HttpMessage {
    let Some(path) = resolve(root, &request.locator.path) else {
        return error(403, "forbidden", &request.locator.path);
    };

    match HttpMessage::from_path(&path) {
        Ok(response) => response,
        Err(err) if err.kind() == ErrorKind::NotFound => error(404, "not found", &request.locator.path),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => error(403, "forbidden", &request.locator.path),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "failed to read file");
            error(500, "internal error", &request.locator.path)
        }
    }
}

/// Maps a request path under `root`, refusing anything that climbs out.
fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if path.ends_with('/') || resolved == root || resolved.is_dir() {
        resolved.push("index.html");
    }
    Some(resolved)
}

fn error(code: u16, message: &str, path: &str) -> HttpMessage {
    HttpMessage::response(code, json!({ "error": message, "path": path }))
}
