use crate::binder::InputSlot;
use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::logging::{init_logging, LogConfig};
use crate::middleware::{AuditMiddleware, AuthorizationMiddleware, MetricsMiddleware};
use crate::response::Response;
use crate::router::{AccessPolicy, HandlerDescriptor};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};
use crate::session::MemorySessionStore;
use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for the brrtmvc demo service
#[derive(Parser)]
#[command(name = "brrtmvc")]
#[command(about = "brrtmvc demo service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo service
    Serve {
        /// YAML configuration file
        #[arg(short, long, env = "BRRTMVC_CONFIG")]
        config: Option<PathBuf>,

        /// Address and port to bind, overriding the configuration
        #[arg(long)]
        addr: Option<String>,

        /// Template directory, overriding the configuration
        #[arg(long)]
        templates: Option<PathBuf>,
    },
    /// Print the demo routing table
    Routes {
        #[arg(short, long, env = "BRRTMVC_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load(p),
        None => Ok(AppConfig::default()),
    }
}

/// Demo handlers: a page, a status payload, an echo of a structured body and
/// an admin-only page.
pub fn demo_routes(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .register(
            HandlerDescriptor::new("Home", "index").page(),
            vec![InputSlot::text("name")],
            |_ctx, args| {
                Ok(Response::page().with_param("name", args.text("name").unwrap_or("world")))
            },
        )
        .register(HandlerDescriptor::new("Home", "status"), vec![], |ctx, _args| {
            Ok(Response::payload(json!({
                "status": "ok",
                "request_id": ctx.request_id(),
            })))
        })
        .register(
            HandlerDescriptor::new("Home", "echo").method(Method::POST),
            vec![InputSlot::object::<Value>("body")],
            |_ctx, mut args| {
                let body = args.take_object::<Value>("body").unwrap_or(Value::Null);
                Ok(Response::created(body))
            },
        )
        .register(
            HandlerDescriptor::new("Admin", "index")
                .page()
                .access(AccessPolicy::roles(["admin"])),
            vec![],
            |_ctx, _args| Ok(Response::page()),
        )
}

/// Build the demo dispatcher with the standard middleware stack.
pub fn demo_dispatcher(config: &AppConfig, metrics: Arc<MetricsMiddleware>) -> Dispatcher {
    let sessions = Arc::new(MemorySessionStore::new());
    let builder = DispatcherBuilder::from_config(config)
        .add_middleware(metrics)
        .add_middleware(Arc::new(AuditMiddleware::default()))
        .add_middleware(Arc::new(AuthorizationMiddleware::new(
            sessions,
            config.session.cookie_name.clone(),
        )));
    demo_routes(builder).build()
}

fn serve(
    config: Option<PathBuf>,
    addr: Option<String>,
    templates: Option<PathBuf>,
) -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    let runtime = RuntimeConfig::from_env();
    runtime.apply();

    let mut config = load_config(config.as_ref())?;
    if let Some(addr) = addr {
        config.server.addr = addr;
    }
    if let Some(dir) = templates {
        config.templates.dir = dir;
    }

    let metrics = Arc::new(MetricsMiddleware::new());
    let dispatcher = demo_dispatcher(&config, Arc::clone(&metrics));
    dispatcher.router().dump_routes();

    let mut service = AppService::new(Arc::new(dispatcher));
    service.set_metrics_middleware(metrics);

    info!(
        addr = %config.server.addr,
        templates = %config.templates.dir.display(),
        stack_size = runtime.stack_size,
        "Starting server"
    );
    let handle = HttpServer(service)
        .start(config.server.addr.as_str())
        .with_context(|| format!("failed to bind {}", config.server.addr))?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server coroutine panicked"))
}

fn routes(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_ref())?;
    let dispatcher = demo_dispatcher(&config, Arc::new(MetricsMiddleware::new()));
    let mut lines: Vec<String> = dispatcher
        .router()
        .descriptors()
        .map(|d| format!("{d}  {:?}  {:?}", d.access_policy(), d.response_shape()))
        .collect();
    lines.sort();
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub fn run_cli() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::Serve {
            config,
            addr,
            templates,
        } => serve(config, addr, templates),
        Commands::Routes { config } => routes(config),
    }
}
