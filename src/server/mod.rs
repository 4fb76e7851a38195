//! Tokio-based server runtime: accepts connections, frames requests off the
//! wire, and feeds them through [`crate::dispatch_loop::handle_request`].
//!
//! Per-connection tasks are tracked in a [`JoinSet`] and torn down on a
//! shutdown broadcast, mirroring how a production accept loop drains
//! in-flight work before exiting rather than dropping connections mid-frame.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::frame::{self, FrameError};
use crate::session::{ClientSession, ServerContext};

/// Run the accept loop on `listener` until a shutdown signal arrives,
/// draining in-flight connections before returning.
pub async fn run(listener: TcpListener, ctx: Arc<ServerContext>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut join_set = JoinSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            res = listener.accept() => {
                handle_accept_result(res, Arc::clone(&ctx), &shutdown_rx, &mut join_set);
            }
        }
    }

    let _ = shutdown_tx.send(true);
    await_spawned_tasks(&mut join_set).await;
}

fn handle_accept_result(
    res: io::Result<(TcpStream, SocketAddr)>,
    ctx: Arc<ServerContext>,
    shutdown_rx: &watch::Receiver<bool>,
    join_set: &mut JoinSet<()>,
) {
    match res {
        Ok((socket, peer)) => {
            let rx = shutdown_rx.clone();
            spawn_client_handler(socket, peer, ctx, rx, join_set);
        }
        Err(err) => warn!(error = %err, "accept error"),
    }
}

fn spawn_client_handler(
    socket: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
    mut shutdown_rx: watch::Receiver<bool>,
    join_set: &mut JoinSet<()>,
) {
    join_set.spawn(async move {
        handle_client(socket, peer, &ctx, &mut shutdown_rx).await;
    });
}

async fn await_spawned_tasks(join_set: &mut JoinSet<()>) {
    while let Some(res) = join_set.join_next().await {
        if let Err(err) = res {
            warn!(error = %err, "connection task panicked");
        }
    }
}

/// Drive one client connection: read a frame, dispatch it, write the reply,
/// repeat until the peer disconnects, a framing error occurs, or shutdown is
/// signalled.
async fn handle_client(
    mut socket: TcpStream,
    peer: SocketAddr,
    ctx: &ServerContext,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut session = ClientSession::new(peer, ctx.sasl_required);
    info!(%peer, "connection accepted");

    loop {
        tokio::select! {
            frame = frame::read_frame(&mut socket) => {
                match frame {
                    Ok(Some(bytes)) => {
                        let reply = crate::dispatch_loop::handle_request(ctx, &mut session, &bytes).await;
                        if let Err(err) = frame::write_frame(&mut socket, &reply).await {
                            warn!(%peer, error = %err, "failed to write reply");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(FrameError::Closed) => break,
                    Err(err) => {
                        warn!(%peer, error = %err, "framing error, closing connection");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!(%peer, "connection closed");
}

/// Wait for a shutdown signal: SIGTERM on Unix, or Ctrl-C anywhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(err) = res {
                            warn!(error = %err, "failed to listen for ctrl-c");
                        }
                    },
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install sigterm handler");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
    }
}
