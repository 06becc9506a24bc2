//! Server entry point - the composition root.
//!
//! Wires the coordinator, the HTTP surface, and (optionally) the embedded
//! Horde worker together. No other module constructs shared state.

mod args;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use grimoire_axum::{ServerConfig, ServerContext};
use grimoire_core::Coordinator;
use grimoire_core::testing::StubEngine;
use grimoire_horde::{HordeClient, HordeWorker, PenaltyState, WorkerConfig};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    // Horde jobs carry other people's prompts; never echo them.
    let quiet = args.quiet || args.hordekey.is_some();

    // The echo engine stands in until a real backend is linked.
    let engine = Arc::new(StubEngine::echoing());
    let coordinator = Arc::new(Coordinator::new(engine, args.multiuser, args.contextsize));

    let config = ServerConfig {
        model_name: args.model_name.clone(),
        image_model_name: None,
        vision: false,
        password: args.password.clone(),
        max_length: args.hordemaxlen,
        max_context_length: args.hordemaxctx,
        quiet,
    };
    let state = Arc::new(ServerContext::new(coordinator.clone(), None, config));

    let cancel = CancellationToken::new();

    if let Some(api_key) = args.hordekey.as_deref() {
        let penalties = Arc::new(PenaltyState::new(state.horde_exit_level.clone()));
        let client = HordeClient::new(args.hordecluster.clone(), api_key)?;
        let worker = HordeWorker::new(
            client,
            WorkerConfig {
                worker_name: args.hordeworkername.clone(),
                model_name: args.model_name.clone(),
                max_length: args.hordemaxlen,
                max_context_length: args.hordemaxctx,
            },
            coordinator.clone(),
            penalties,
        );
        tokio::spawn(worker.run(cancel.clone()));
        info!(worker = %args.hordeworkername, "embedded horde worker enabled");
    }

    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!(host = %args.host, port = args.port, model = %args.model_name, "starting server");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.cancel();
            }
            Err(err) => warn!(%err, "failed to listen for shutdown signal"),
        }
    });

    grimoire_axum::serve(listener, state, cancel).await
}
