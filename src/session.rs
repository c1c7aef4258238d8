//! Per-connection chat session.
//!
//! A session moves through a fixed sequence of states:
//!
//! ```text
//! Handshake -> WaitForPeer -> LocalReply -> WaitForPeer -> ... -> Closed
//! ```
//!
//! Turns alternate strictly: the peer speaks, then the operator replies, then
//! the peer again. Either side ends the session by sending the quit sentinel.
//! Any framing or transport error closes this session only.

use crate::codec::{recv_frame, send_frame, FrameError};
use crate::console::Console;
use crate::operator::Operator;
use crate::QUIT_SENTINEL;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Current position in the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Exchanging handles with the peer.
    Handshake,
    /// Waiting for the peer's next message.
    WaitForPeer,
    /// Waiting for the operator's reply.
    LocalReply,
    /// Connection closed; no further operations.
    Closed(SessionEnd),
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent the quit sentinel.
    PeerLeft,
    /// The operator typed the quit sentinel (or operator input ended).
    LocalQuit,
    /// A framing or transport error ended the session.
    Aborted,
}

/// Shared resources handed to every session at construction.
#[derive(Clone)]
pub struct SessionContext {
    pub console: Console,
    pub operator: Operator,
    /// Largest payload accepted from the peer; `None` accepts any length.
    pub max_frame_size: Option<usize>,
}

/// One chat session over an exclusively owned stream.
pub struct Session<S> {
    id: u64,
    peer: SocketAddr,
    stream: S,
    server_handle: String,
    client_handle: String,
    state: SessionState,
    ctx: SessionContext,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        id: u64,
        peer: SocketAddr,
        stream: S,
        server_handle: String,
        ctx: SessionContext,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            server_handle,
            client_handle: String::new(),
            state: SessionState::Handshake,
            ctx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle received from the peer; empty until the handshake completes.
    pub fn client_handle(&self) -> &str {
        &self.client_handle
    }

    /// Drive the session until it closes.
    pub async fn run(mut self) -> Result<SessionEnd, FrameError> {
        loop {
            if let SessionState::Closed(end) = self.step().await? {
                return Ok(end);
            }
        }
    }

    /// Perform the work of the current state and advance to the next one.
    ///
    /// On error the connection is closed and the session moves to
    /// `Closed(Aborted)`. Stepping a closed session does nothing.
    pub async fn step(&mut self) -> Result<SessionState, FrameError> {
        let result = match self.state {
            SessionState::Handshake => self.handshake().await,
            SessionState::WaitForPeer => self.wait_for_peer().await,
            SessionState::LocalReply => self.local_reply().await,
            SessionState::Closed(_) => return Ok(self.state),
        };

        match result {
            Ok(next) => {
                if matches!(next, SessionState::Closed(_)) {
                    self.close().await;
                }
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                self.close().await;
                self.state = SessionState::Closed(SessionEnd::Aborted);
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<SessionState, FrameError> {
        self.ctx
            .console
            .println(format_args!("Connection from {}", self.peer));

        // The peer's handle is taken as-is: empty, oversized or control
        // characters are all accepted.
        let handle = recv_frame(&mut self.stream, self.ctx.max_frame_size).await?;
        self.client_handle = String::from_utf8_lossy(&handle).into_owned();

        send_frame(&mut self.stream, self.server_handle.as_bytes()).await?;

        info!(
            session = self.id,
            peer = %self.peer,
            client = %self.client_handle,
            server = %self.server_handle,
            "Handshake complete"
        );
        Ok(SessionState::WaitForPeer)
    }

    async fn wait_for_peer(&mut self) -> Result<SessionState, FrameError> {
        let message = recv_frame(&mut self.stream, self.ctx.max_frame_size).await?;

        if &message[..] == QUIT_SENTINEL.as_bytes() {
            self.ctx
                .console
                .println(format_args!("{} left the chat", self.client_handle));
            return Ok(SessionState::Closed(SessionEnd::PeerLeft));
        }

        self.ctx.console.println(format_args!(
            "{}> {}",
            self.client_handle,
            String::from_utf8_lossy(&message)
        ));
        Ok(SessionState::LocalReply)
    }

    async fn local_reply(&mut self) -> Result<SessionState, FrameError> {
        let prompt = format!("{}> ", self.server_handle);
        let line = match self.ctx.operator.read_line(prompt).await {
            Some(line) => line,
            None => {
                debug!(session = self.id, "Operator input ended, quitting session");
                QUIT_SENTINEL.to_string()
            }
        };

        if line == QUIT_SENTINEL {
            send_frame(&mut self.stream, QUIT_SENTINEL.as_bytes()).await?;
            self.ctx
                .console
                .println(format_args!("{} closed connection", self.server_handle));
            return Ok(SessionState::Closed(SessionEnd::LocalQuit));
        }

        send_frame(&mut self.stream, line.as_bytes()).await?;
        Ok(SessionState::WaitForPeer)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(session = self.id, error = %e, "Shutdown failed");
        }
    }
}
