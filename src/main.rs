//! chat-relay entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config, init logger
//!   3. Build session store, completion client, push channel
//!   4. Start the reply-dispatch worker pool
//!   5. Serve the inbound webhook until ctrl-c
//!   6. Cancel the shutdown token and drain the pool

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use chat_relay::config;
use chat_relay::dispatch::{self, PipelineCtx, ReplyDispatcher};
use chat_relay::error::AppError;
use chat_relay::llm;
use chat_relay::logger;
use chat_relay::push;
use chat_relay::router::CommandRouter;
use chat_relay::server;
use chat_relay::session::{MemoryStore, SessionStore, Sessions};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        bind = %config.bind,
        llm_provider = %config.llm.provider,
        push_channel = %config.push.channel,
        "config loaded"
    );

    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let sessions = Sessions::new(store);
    let client = llm::build(&config.llm, config.llm_api_key.clone())?;
    let push = push::build(&config.push, config.push_credential.clone())?;

    let ctx = Arc::new(PipelineCtx {
        sessions: sessions.clone(),
        client,
        push,
        retry: config.dispatch.retry_policy(),
    });

    let shutdown = CancellationToken::new();
    let workers = config
        .dispatch
        .workers
        .unwrap_or_else(dispatch::default_worker_count);
    let (dispatcher, pool) =
        ReplyDispatcher::start(ctx, workers, config.dispatch.queue_depth, shutdown.clone());

    let router = Arc::new(CommandRouter::new(
        config.commands.clone(),
        sessions,
        dispatcher,
    ));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — shutting down");
            signal_shutdown.cancel();
        }
    });

    server::serve(&config.bind, router, shutdown.clone()).await?;

    shutdown.cancel();
    pool.join().await;
    info!("shutdown complete");

    Ok(())
}
