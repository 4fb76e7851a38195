//! `virtd`: the RPC dispatch core's binary entry point.
//!
//! Configuration is loaded via [`OrthoConfig`], merging environment variables
//! (`VIRTD_*`) over the built-in defaults. Wires up a driver facade and SASL
//! engine, binds the listener, and runs the accept loop until shutdown. No
//! production driver binding ships in this crate (see
//! [`virtd::driver::DriverFacade`]'s doc comment); this binary links
//! [`virtd::test_support::MockDriver`], so it is only built with the
//! `test-support` feature enabled.

use std::sync::Arc;

use anyhow::{Context, Result};
use cli_defs::AppConfig;
use ortho_config::OrthoConfig;
use tracing::info;

use virtd::sasl::PlainEngine;
use virtd::server;
use virtd::session::ServerContext;
use virtd::test_support::MockDriver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = AppConfig::load().context("failed to load configuration via OrthoConfig")?;

    let driver = Arc::new(MockDriver::new());
    // No credential store is wired up; PLAIN negotiation will reject every
    // mechanism attempt until a real store is supplied alongside a driver.
    let sasl_engine = Arc::new(PlainEngine::new(Vec::new()));
    let ctx = Arc::new(ServerContext {
        force_readonly: cfg.readonly,
        ..ServerContext::new(driver, sasl_engine, cfg.sasl_required)
    });

    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind))?;
    info!(bind = %cfg.bind, readonly = cfg.readonly, sasl_required = cfg.sasl_required, "virtd listening");

    server::run(listener, ctx).await;
    Ok(())
}
