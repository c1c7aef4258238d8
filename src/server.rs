//! TCP server for chat sessions.
//!
//! Accepts incoming connections and runs one session task per connection.
//! The accept loop never waits on a session; it stops only when the shutdown
//! future passed to [`Server::run`] completes.

use crate::config::Config;
use crate::console::Console;
use crate::operator::Operator;
use crate::session::{Session, SessionContext, SessionEnd};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Server instance
pub struct Server {
    listener: TcpListener,
    ctx: SessionContext,
    handle_prefix: String,
    session_limit: Option<Arc<Semaphore>>,
    next_session_id: u64,
}

impl Server {
    /// Bind the listening socket and prepare shared session resources.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &Config, console: Console, operator: Operator) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::from_std(create_listener(addr, config.backlog)?)?;

        Ok(Server {
            listener,
            ctx: SessionContext {
                console,
                operator,
                max_frame_size: config.max_frame_size,
            },
            handle_prefix: config.handle_prefix.clone(),
            session_limit: config
                .max_sessions
                .map(|max| Arc::new(Semaphore::new(max))),
            next_session_id: 1,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` completes, then abort any live
    /// sessions.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, "Server listening");
        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();

        loop {
            // Wait for a session slot
            let permit = match &self.session_limit {
                Some(limit) => tokio::select! {
                    permit = Arc::clone(limit).acquire_owned() => Some(permit?),
                    _ = &mut shutdown => break,
                },
                None => None,
            };

            self.ctx.console.println("Server is ready to receive");

            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = &mut shutdown => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let id = self.next_session_id;
                    self.next_session_id += 1;
                    let handle = format!("{}-{}", self.handle_prefix, id);
                    debug!(session = id, peer = %peer, handle = %handle, "New connection");

                    let session = Session::new(id, peer, stream, handle, self.ctx.clone());
                    sessions.spawn(async move {
                        match session.run().await {
                            Ok(SessionEnd::PeerLeft) => debug!(session = id, "Peer left"),
                            Ok(end) => debug!(session = id, ?end, "Session closed"),
                            Err(e) => {
                                warn!(session = id, peer = %peer, error = %e, "Session terminated")
                            }
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }

            // Reap finished sessions
            while let Some(finished) = sessions.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Session task failed");
                }
            }
        }

        info!(live_sessions = sessions.len(), "Shutting down");
        sessions.shutdown().await;
        Ok(())
    }
}

/// Create a TCP listener with SO_REUSEADDR and an explicit backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
