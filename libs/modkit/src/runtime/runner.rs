//! Drives a set of modules through their phases:
//! init, db (only with a database), rest, start, then stop once shutdown is requested.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
use crate::registry::{ModuleRegistry, Registrator};
use crate::runtime::shutdown;

pub enum DbOptions {
    /// Modules see `ctx.db() == None` and the db phase is skipped.
    None,
    /// Shared by every module and closed after the stop phase.
    Handle(Arc<modkit_db::DbHandle>),
}

/// What ends the running phase.
pub enum ShutdownOptions {
    /// SIGINT/SIGTERM (Ctrl+C elsewhere).
    Signals,
    /// Caller cancels the token.
    Token(CancellationToken),
    /// Completes when the future does.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    pub modules_cfg: Arc<dyn ConfigProvider>,
    pub db: DbOptions,
    pub shutdown: ShutdownOptions,
    pub modules: Vec<Registrator>,
}

/// Runs until shutdown is requested, then stops every started module.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = shutdown_token(opts.shutdown);
    let registry = ModuleRegistry::from_registrators(&opts.modules)?;

    let mut ctx = ModuleCtxBuilder::new(cancel.clone()).with_config_provider(opts.modules_cfg);
    let db = match opts.db {
        DbOptions::Handle(db) => {
            ctx = ctx.with_db(db.clone());
            Some(db)
        }
        DbOptions::None => None,
    };

    let result = run_phases(&registry, &ctx.build(), db.as_deref(), cancel).await;
    if let Some(db) = db {
        db.close().await;
    }
    result
}

/// A token cancelled by whatever the caller chose to end the run.
fn shutdown_token(trigger: ShutdownOptions) -> CancellationToken {
    let waiter: Pin<Box<dyn Future<Output = ()> + Send>> = match trigger {
        ShutdownOptions::Token(token) => return token,
        ShutdownOptions::Future(waiter) => waiter,
        ShutdownOptions::Signals => Box::pin(async {
            if let Err(e) = shutdown::wait_for_shutdown().await {
                tracing::warn!(error = %e, "signal handlers unavailable, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }),
    };

    let token = CancellationToken::new();
    let trip = token.clone();
    tokio::spawn(async move {
        waiter.await;
        tracing::info!("shutdown requested");
        trip.cancel();
    });
    token
}

async fn run_phases(
    registry: &ModuleRegistry,
    ctx: &ModuleCtx,
    db: Option<&modkit_db::DbHandle>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    registry.run_init_phase(ctx).await?;

    match db {
        Some(db) => registry.run_db_phase(db).await?,
        None => tracing::info!("no database attached, skipping db phase"),
    }

    // The router is retained by the REST host
    registry.run_rest_phase(ctx, axum::Router::new())?;

    if let Err(e) = registry.run_start_phase(cancel.clone()).await {
        cancel.cancel();
        registry.run_stop_phase(cancel).await;
        return Err(e.into());
    }
    tracing::info!("all modules started");

    cancel.cancelled().await;
    registry.run_stop_phase(cancel).await;
    Ok(())
}
