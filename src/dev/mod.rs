//! The `dev` command: preview server, source watches, and live reload.
//!
//! ```text
//!   notify watchers ──► mpsc ──► dispatch thread ──► tasks::run ──► LiveReload
//!                                                                       │
//!   browser ◄── axum (ServeDir + injected client) ◄── /__livereload ◄───┘
//! ```
//!
//! [`DevServer`] goes from idle to watching once, in [`DevServer::start`]:
//! bind the listener (a busy port is fatal), spawn the HTTP server, then
//! register the watches. There is no way back to idle; the process runs
//! until it is interrupted.

mod reload;
pub mod server;
pub mod watch;

pub use reload::LiveReload;

use crate::context::Context;
use crate::paths::PathError;
use notify::RecommendedWatcher;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, mpsc};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum DevError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error("dev server is already running")]
    AlreadyStarted,
}

enum DevState {
    Idle,
    Watching {
        addr: SocketAddr,
        server: JoinHandle<()>,
        _watchers: Vec<RecommendedWatcher>,
    },
}

pub struct DevServer {
    ctx: Arc<Context>,
    state: DevState,
}

impl DevServer {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            state: DevState::Idle,
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, DevState::Watching { .. })
    }

    /// Address the server is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            DevState::Watching { addr, .. } => Some(*addr),
            DevState::Idle => None,
        }
    }

    /// Bind, serve, and watch. Must be called inside a tokio runtime.
    pub async fn start(&mut self) -> Result<SocketAddr, DevError> {
        if self.is_watching() {
            return Err(DevError::AlreadyStarted);
        }

        let options = &self.ctx.config().server;
        let bind_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, options.port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| DevError::Bind {
                addr: bind_addr,
                source,
            })?;
        let addr = listener.local_addr()?;

        let root = self.ctx.resolve(self.ctx.config().document_root());
        let app = server::router(options, root.clone(), self.ctx.reload().clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("preview server stopped: {e}");
            }
        });

        let (tx, rx) = mpsc::channel();
        let watchers = match watch::register(&self.ctx, tx) {
            Ok(watchers) => watchers,
            Err(e) => {
                server.abort();
                return Err(e);
            }
        };
        let ctx = Arc::clone(&self.ctx);
        std::thread::Builder::new()
            .name("sitepipe-watch".into())
            .spawn(move || watch::dispatch_loop(ctx, rx))?;

        tracing::info!(root = %root.display(), "serving on http://{addr}");
        self.state = DevState::Watching {
            addr,
            server,
            _watchers: watchers,
        };
        Ok(addr)
    }

    /// Start, then block until Ctrl-C or SIGTERM.
    pub async fn run(mut self) -> Result<(), DevError> {
        self.start().await?;
        shutdown_signal().await?;
        tracing::info!("shutting down");
        if let DevState::Watching { server, .. } = &self.state {
            server.abort();
        }
        Ok(())
    }
}

/// Waits for SIGINT (Ctrl+C) or, on unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<_, std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
