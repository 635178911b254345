//! The mock server: listener, accept loop and shutdown.
//!
//! `Server::new` builds the store and loads initial expectations,
//! `Server::bind` opens the listener and starts continuous persistence, and
//! `BoundServer::serve` accepts connections until the shutdown future
//! resolves.

mod handler;
mod lifecycle;

pub use handler::MockService;
pub use lifecycle::{Lifecycle, ServerState};

use crate::config::ServerConfig;
use crate::expectation::persistence::{self, PersistenceError};
use crate::expectation::{ExpectationStore, PersistenceGateway, PersistenceWriter};
use crate::response::ResponseDispatcher;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Error types for the server lifecycle
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("accept loop failed: {0}")]
    Accept(#[source] io::Error),
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// A configured server that has not yet bound its listener.
pub struct Server {
    config: Arc<ServerConfig>,
    store: Arc<ExpectationStore>,
    dispatcher: ResponseDispatcher,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Build the server and load the initialization file, if any. A file
    /// that cannot be loaded is logged and the server starts empty.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let dispatcher =
            ResponseDispatcher::new(&config).map_err(|e| ServerError::Config(e.to_string()))?;

        let store = Arc::new(ExpectationStore::new());
        if let Some(path) = &config.initialization_path {
            match persistence::load_initial(path) {
                Ok(expectations) => match store.replace_all(expectations) {
                    Ok(count) => info!(
                        path = %path.display(),
                        count,
                        "Loaded initial expectations"
                    ),
                    Err(e) => error!("Initial expectations rejected, starting empty: {}", e),
                },
                Err(e) => error!("Failed to load initial expectations, starting empty: {}", e),
            }
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            dispatcher,
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    pub fn store(&self) -> Arc<ExpectationStore> {
        Arc::clone(&self.store)
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Bind the listener and start the persistence writer.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.config.bind_address();
        let listener = match TcpListener::bind(addr.as_str()).await {
            Ok(listener) => listener,
            Err(source) => {
                self.lifecycle.advance(ServerState::Stopped);
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr().map_err(|source| {
            self.lifecycle.advance(ServerState::Stopped);
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;

        let persistence = if self.config.persistence.enabled {
            let gateway = Arc::new(PersistenceGateway::new(
                self.config.persistence.path.clone(),
                Arc::clone(&self.store),
            ));
            info!(path = %gateway.path().display(), "Persisting expectations");
            let writer = Arc::clone(&gateway).spawn();
            Some((gateway, writer))
        } else {
            None
        };

        let service = Arc::new(MockService::new(
            Arc::clone(&self.store),
            self.dispatcher,
            Arc::clone(&self.lifecycle),
            local_addr.port(),
        ));

        info!("Mirage mock server listening on http://{}", local_addr);
        if self.config.cors.enabled {
            info!(origin = %self.config.cors.allow_origin, "CORS enabled");
        }
        self.lifecycle.advance(ServerState::Running);

        Ok(BoundServer {
            listener,
            local_addr,
            config: self.config,
            store: self.store,
            service,
            persistence,
            lifecycle: self.lifecycle,
        })
    }
}

/// A server with a bound listener, ready to accept connections.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Arc<ServerConfig>,
    store: Arc<ExpectationStore>,
    service: Arc<MockService>,
    persistence: Option<(Arc<PersistenceGateway>, PersistenceWriter)>,
    lifecycle: Arc<Lifecycle>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<ExpectationStore> {
        Arc::clone(&self.store)
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Accept connections until `shutdown` resolves, then drain live
    /// connections for up to the grace period and flush persistence.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let BoundServer {
            listener,
            config,
            service,
            persistence,
            lifecycle,
            ..
        } = self;

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        let accept_result = loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            let io = TokioIo::new(stream);
                            let service = Arc::clone(&service);
                            let conn = http1::Builder::new()
                                .keep_alive(true)
                                .serve_connection(io, service_fn(move |req| {
                                    let service = Arc::clone(&service);
                                    async move { service.serve(req).await }
                                }));
                            let conn = graceful.watch(conn);

                            connections.spawn(async move {
                                if let Err(e) = conn.await {
                                    debug!("Connection error from {}: {}", remote_addr, e);
                                }
                            });
                        }
                        Err(e) => match accept_backoff(&e) {
                            Some(backoff) => {
                                warn!("Accept error: {}", e);
                                if !backoff.is_zero() {
                                    tokio::time::sleep(backoff).await;
                                }
                            }
                            None => break Err(e),
                        },
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => break Ok(()),
            }
        };

        drop(listener);

        if let Err(e) = accept_result {
            error!("Accept loop failed: {}", e);
            connections.shutdown().await;
            if let Some((_, writer)) = persistence {
                writer.stop().await;
            }
            lifecycle.advance(ServerState::Stopped);
            return Err(ServerError::Accept(e));
        }

        lifecycle.advance(ServerState::Stopping);

        let grace = config.listen.shutdown_grace();
        if tokio::time::timeout(grace, graceful.shutdown()).await.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                open = connections.len(),
                "Grace period elapsed, closing remaining connections"
            );
        }
        // Nothing may touch the store once the final flush starts.
        connections.shutdown().await;

        let flushed = match persistence {
            Some((gateway, writer)) => {
                writer.stop().await;
                gateway.flush()
            }
            None => Ok(()),
        };

        lifecycle.advance(ServerState::Stopped);
        flushed.map_err(|e| {
            error!("Failed to flush expectations on shutdown: {}", e);
            ServerError::Persistence(e)
        })
    }
}

const EXHAUSTED_BACKOFF: Duration = Duration::from_millis(100);

/// How long to pause before accepting again, or `None` when the listener
/// itself is broken. Running out of descriptors or buffers is temporary.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => return Some(Duration::ZERO),
        io::ErrorKind::OutOfMemory => return Some(EXHAUSTED_BACKOFF),
        _ => {}
    }
    if is_resource_exhausted(e) {
        Some(EXHAUSTED_BACKOFF)
    } else {
        None
    }
}

#[cfg(unix)]
fn is_resource_exhausted(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhausted(_e: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;

    fn local_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listen.host = "127.0.0.1".to_string();
        config.listen.port = 0;
        config.listen.shutdown_grace_ms = 200;
        config
    }

    #[test]
    fn test_corrupt_init_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let init = dir.path().join("init.json");
        std::fs::write(&init, "{ not json").unwrap();

        let config = ServerConfig {
            initialization_path: Some(init),
            ..local_config()
        };
        let server = Server::new(config).unwrap();
        assert!(server.store().is_empty());
        assert_eq!(server.state(), ServerState::Starting);
    }

    #[test]
    fn test_init_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let init = dir.path().join("init.json");
        std::fs::write(
            &init,
            r#"[{"httpRequest":{"method":"GET","path":"/buses"},"httpResponse":{"statusCode":200,"body":"[]"}}]"#,
        )
        .unwrap();

        let config = ServerConfig {
            initialization_path: Some(init),
            ..local_config()
        };
        assert_eq!(Server::new(config).unwrap().store().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = local_config();
        config.fallback.status_code = 7;
        assert!(matches!(Server::new(config), Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = local_config();
        config.listen.port = taken.local_addr().unwrap().port();

        let server = Server::new(config).unwrap();
        let lifecycle = Arc::clone(&server.lifecycle);
        assert!(matches!(
            server.bind().await,
            Err(ServerError::Bind { .. })
        ));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = dir.path().join("persisted.json");
        let config = ServerConfig {
            persistence: PersistenceConfig {
                enabled: true,
                path: persisted.clone(),
            },
            ..local_config()
        };

        let bound = Server::new(config).unwrap().bind().await.unwrap();
        let store = bound.store();
        let lifecycle = bound.lifecycle();
        assert_eq!(lifecycle.state(), ServerState::Running);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(bound.serve(async move {
            let _ = rx.await;
        }));

        store
            .add(crate::expectation::Expectation::new(
                Default::default(),
                crate::expectation::ResponseTemplate::status(204),
            ))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(lifecycle.state(), ServerState::Stopped);
        assert_eq!(persistence::load_initial(&persisted).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_final_flush_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "regular file").unwrap();
        let config = ServerConfig {
            persistence: PersistenceConfig {
                enabled: true,
                path: blocker.join("persisted.json"),
            },
            ..local_config()
        };

        let bound = Server::new(config).unwrap().bind().await.unwrap();
        let lifecycle = bound.lifecycle();
        let result = bound.serve(async {}).await;

        assert!(matches!(result, Err(ServerError::Persistence(_))));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[test]
    fn test_accept_errors_classified() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(accept_backoff(&reset), Some(Duration::ZERO));

        let broken = io::Error::from(io::ErrorKind::InvalidInput);
        assert_eq!(accept_backoff(&broken), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_descriptor_exhaustion_backs_off() {
        for code in [libc::EMFILE, libc::ENFILE] {
            let err = io::Error::from_raw_os_error(code);
            assert_eq!(accept_backoff(&err), Some(EXHAUSTED_BACKOFF));
        }
    }
}
