//! Owns the two units of the pipeline and runs them side by side.
//!
//! The HTTP front end and the relay listener each own their socket and share
//! nothing but the relay address. Either may stop on its own without taking
//! the other down; shutdown cancels both.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::codec::{Clock, LocalClock};
use crate::config::Config;
use crate::db;
use crate::error::Error;
use crate::http::{AppState, HttpFrontend};
use crate::listener::RelayListener;
use crate::relay::DatagramRelay;
use crate::storage::{Sink, SqliteSink};

pub struct Supervisor {
    http: HttpFrontend,
    listener: RelayListener,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Prepares the store and binds both units from `config`.
    ///
    /// A bind failure on either address is returned; an unreachable store
    /// is only logged, since every insert reconnects anyway.
    pub async fn start(config: &Config) -> Result<Self, Error> {
        if let Err(e) = db::init_store(&config.database_url).await {
            error!("Store initialization failed for {}: {}", config.database_url, e);
        }

        let sink = Arc::new(SqliteSink::new(&config.database_url));
        Self::bind(config, sink, Arc::new(LocalClock)).await
    }

    /// Binds both units with an explicit sink and clock.
    pub async fn bind(
        config: &Config,
        sink: Arc<dyn Sink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let listener = RelayListener::bind(config.relay_addr, sink, clock).await?;

        let relay = DatagramRelay::new(listener.local_addr()?);
        let state = AppState::new(relay, &config.static_dir);
        let http = HttpFrontend::bind(config.http_addr, state).await?;

        Ok(Self {
            http,
            listener,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn http_addr(&self) -> Result<SocketAddr, Error> {
        self.http.local_addr()
    }

    pub fn relay_addr(&self) -> Result<SocketAddr, Error> {
        self.listener.local_addr()
    }

    /// Token that stops both units when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs both units until each has stopped.
    pub async fn run(self) -> Result<(), Error> {
        let mut units = JoinSet::new();

        let token = self.shutdown.clone();
        let http = self.http;
        units.spawn(
            async move { ("HTTP server", http.run(token).await) }
                .instrument(info_span!("http_server")),
        );

        let token = self.shutdown.clone();
        let listener = self.listener;
        units.spawn(
            async move { ("Relay listener", listener.run(token).await) }
                .instrument(info_span!("relay_listener")),
        );

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((unit, Ok(()))) => info!("{} exited", unit),
                Ok((unit, Err(e))) => error!("{} failed: {}", unit, e),
                Err(e) => error!("Unit task aborted: {}", e),
            }
        }

        Ok(())
    }

    /// Runs both units and cancels them on Ctrl+C or SIGTERM.
    pub async fn run_until_signal(self) -> Result<(), Error> {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            token.cancel();
        });

        self.run().await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
