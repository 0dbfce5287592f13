#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_sdk::{resource::Resource, trace as sdktrace};
use rama::{
    Layer as RamaLayer,
    graceful::Shutdown,
    http::{layer::trace::TraceLayer, server::HttpServer},
    layer::ConsumeErrLayer,
    rt::Executor,
    tcp::server::TcpListener,
};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use gorp::config::{Config, Overrides, ServerConfig};
use gorp::proxy::GorpProxy;

#[derive(Debug, Parser)]
#[command(author, version, about = "Gorp package registry proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the Gorp proxy server
    Start {
        /// Port to listen on, overrides the config file
        #[arg(long)]
        port: Option<u16>,
        /// Config file location relative to the home directory
        #[arg(long)]
        location: Option<String>,
        /// Serve placeholder tarballs and point metadata at this server
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a default configuration file
    Init {
        /// Config file location relative to the home directory
        #[arg(long)]
        location: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Perform a health check against a Gorp instance
    Health {
        /// URL of the health endpoint (defaults to local proxy)
        #[arg(long, default_value = "http://127.0.0.1:3224/health")]
        url: String,
        /// Timeout in seconds for the request
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Start {
            port,
            location,
            dry_run,
        } => run_server(Overrides { port }, location.as_deref(), dry_run),
        Command::Init { location, force } => run_init(location.as_deref(), force),
        Command::Health { url, timeout } => run_health(url, timeout),
    }
}

fn run_server(overrides: Overrides, location: Option<&str>, dry_run: bool) -> Result<()> {
    let path = Config::locate(location);
    if !path.exists() {
        bail!(
            "no configuration found at {}; run `gorp init` to create one",
            path.display()
        );
    }
    let config = Config::load(&path)
        .context("loading configuration")?
        .with_overrides(overrides);
    config.validate().context("validating configuration")?;
    let config = Arc::new(config);
    init_tracing(&config)?;

    tracing::info!(path = %path.display(), "configuration loaded");
    if dry_run {
        tracing::warn!(
            "dry run enabled: tarball downloads are mocked and metadata points at this server"
        );
    }

    let proxy = GorpProxy::new(config.clone(), dry_run).context("creating proxy service")?;

    let rt_server = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
        .context("constructing server runtime")?;

    rt_server.block_on(serve(&config.server, proxy, async {
        tokio::signal::ctrl_c()
            .await
            .context("listening for shutdown signal")
    }))
}

/// Binds the listener, then serves until `shutdown` resolves. A bind failure
/// is returned before anything is spawned.
async fn serve<F>(server: &ServerConfig, proxy: GorpProxy, shutdown: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let addr = format!("{}:{}", server.host, server.port);
    let tcp_service = TcpListener::build()
        .bind(addr.clone())
        .await
        .map_err(|err| anyhow!("binding listener on {addr}: {err}"))?;

    tracing::info!(%addr, "starting Rama HTTP server");

    let graceful = Shutdown::default();
    graceful.spawn_task_fn(move |guard| async move {
        let exec = Executor::graceful(guard.clone());
        let http_service = HttpServer::auto(exec).service(
            (TraceLayer::new_for_http(), ConsumeErrLayer::default()).into_layer(proxy),
        );

        tcp_service.serve_graceful(guard, http_service).await;
    });

    shutdown.await?;
    tracing::info!("shutting down");

    graceful
        .shutdown_with_limit(Duration::from_secs(30))
        .await?;

    Ok(())
}

fn run_init(location: Option<&str>, force: bool) -> Result<()> {
    let path = Config::locate(location);
    write_default_config(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let raw = Config::default().to_pretty_json()?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn run_health(url: String, timeout: u64) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("building health check client")?;

    let response = client
        .get(&url)
        .send()
        .context("sending health check request")?;

    if response.status().is_success() {
        println!("Gorp healthy: {}", response.status());
        Ok(())
    } else {
        bail!("health endpoint returned status {}", response.status());
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("building log filter")?;

    let fmt_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(config.logging.ansi)
            .boxed()
    };

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        use opentelemetry_otlp::WithExportConfig;

        let resource = Resource::builder_empty()
            .with_attributes([
                KeyValue::new("service.name", "gorp"),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ])
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()?;

        let provider = sdktrace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build();

        let tracer = provider.tracer("gorp");
        global::set_tracer_provider(provider);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        registry.try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_a_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gorp").join("gorp-config.json");

        write_default_config(&path, false).unwrap();

        let config = Config::load(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.port, 3224);
        assert_eq!(config.node.registry, "https://registry.npmjs.org");
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gorp-config.json");
        fs::write(&path, "{}").unwrap();

        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
        assert_ne!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn serve_fails_when_the_address_is_taken() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
            workers: 1,
        };
        let proxy = GorpProxy::new(Arc::new(Config::default()), false).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(&server, proxy, std::future::pending::<Result<()>>()),
        )
        .await
        .expect("serve should return instead of waiting for shutdown");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("binding listener"));
    }

    #[test]
    fn cli_parses_start_flags() {
        let cli = Cli::parse_from(["gorp", "start", "--port", "8080", "--dry-run"]);
        match cli.command {
            Command::Start {
                port,
                location,
                dry_run,
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(location, None);
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
