use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use presana::model::NodeId;
use presana::predict::ModelVariant;
use presana::runtime::config::load_app_config;
use presana::runtime::http::HttpServer;
use presana::RoutingAgent;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "presana")]
#[command(about = "Goal-based mesh routing agent with model-predicted edge costs")]
struct Args {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value = "INFO")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the randomize / network / run API over HTTP.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one route search and print the outcome as JSON.
    Route {
        #[arg(long)]
        start: String,
        #[arg(long)]
        dest: String,
        #[arg(long, default_value = "linear")]
        model: ModelVariant,
        #[arg(long)]
        randomize: bool,
    },
    /// Print the current edge metrics as JSON.
    State,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut cfg = load_app_config(args.config.as_deref())?;
    let agent = Arc::new(RoutingAgent::from_config(&cfg)?);

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                cfg.http.port = port;
            }
            let running = Arc::new(AtomicBool::new(true));
            let flag = Arc::clone(&running);
            ctrlc::set_handler(move || {
                flag.store(false, Ordering::Relaxed);
            })?;
            HttpServer::new(agent, cfg.http).serve(&running)?;
        }
        Command::Route {
            start,
            dest,
            model,
            randomize,
        } => {
            if randomize {
                agent.randomize_network();
            }
            let outcome =
                agent.find_best_route(&NodeId::from(start), &NodeId::from(dest), model)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::State => {
            let snapshot = agent.get_network_state();
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
