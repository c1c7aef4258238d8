//! Interactive chat client.
//!
//! The client speaks first: it sends its handle, learns the server's handle,
//! then alternates sending a typed line and printing the server's reply.

use crate::codec::{recv_frame, send_frame, FrameError};
use crate::console::Console;
use crate::QUIT_SENTINEL;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Longest handle the client will send, in bytes.
pub const MAX_HANDLE_LEN: usize = 10;

/// Longest message the client will send, in bytes.
pub const MAX_MESSAGE_LEN: usize = 500;

/// How a client conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEnd {
    /// The local user typed the quit sentinel.
    LocalQuit,
    /// The server sent the quit sentinel.
    ServerLeft,
}

/// Reduce typed input to a handle: the first word, cut to [`MAX_HANDLE_LEN`].
pub fn normalize_handle(input: &str) -> String {
    let word = input.split_whitespace().next().unwrap_or("");
    truncate_utf8(word, MAX_HANDLE_LEN).to_string()
}

/// Cut `text` to at most `max` bytes without splitting a character.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Run a conversation with the server over `stream`.
///
/// Typed lines come from `lines`; the end of that stream counts as quitting.
pub async fn run<S>(
    mut stream: S,
    handle: &str,
    lines: &mut mpsc::Receiver<String>,
    console: &Console,
) -> Result<ClientEnd, FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_frame(&mut stream, handle.as_bytes()).await?;
    let server_handle = recv_frame(&mut stream, None).await?;
    let server_handle = String::from_utf8_lossy(&server_handle).into_owned();
    console.println(format_args!("Connection established with: {}", server_handle));

    let end = loop {
        console.prompt(format_args!("{}> ", handle));
        let line = lines.recv().await.unwrap_or_else(|| QUIT_SENTINEL.to_string());
        let message = truncate_utf8(&line, MAX_MESSAGE_LEN);

        send_frame(&mut stream, message.as_bytes()).await?;
        if message == QUIT_SENTINEL {
            console.println(format_args!("{} left the chat", handle));
            break ClientEnd::LocalQuit;
        }

        let reply = recv_frame(&mut stream, None).await?;
        if &reply[..] == QUIT_SENTINEL.as_bytes() {
            console.println(format_args!("{} left the chat", server_handle));
            break ClientEnd::ServerLeft;
        }
        console.println(format_args!(
            "{}> {}",
            server_handle,
            String::from_utf8_lossy(&reply)
        ));
    };

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Shutdown failed");
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::CaptureBuffer;
    use crate::operator::Operator;
    use crate::session::{Session, SessionContext, SessionEnd};
    use tokio::io::duplex;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("alice"), "alice");
        assert_eq!(normalize_handle("  bob smith\n"), "bob");
        assert_eq!(normalize_handle("abcdefghijklmno"), "abcdefghij");
        assert_eq!(normalize_handle(""), "");
    }

    #[test]
    fn test_truncate_utf8_respects_char_boundaries() {
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("héllo", 3), "hé");
        assert_eq!(truncate_utf8("short", 500), "short");
    }

    #[tokio::test]
    async fn test_client_against_session() {
        let server_out = CaptureBuffer::default();
        let (operator_input, operator_lines) = mpsc::channel(4);
        let ctx = SessionContext {
            console: server_out.console(),
            operator: Operator::spawn(server_out.console(), operator_lines),
            max_frame_size: None,
        };
        let (client_side, server_side) = duplex(1024);
        let peer = "127.0.0.1:40000".parse().unwrap();
        let session = tokio::spawn(
            Session::new(1, peer, server_side, "Server-1".to_string(), ctx).run(),
        );

        let client_out = CaptureBuffer::default();
        let (typed, mut client_lines) = mpsc::channel(4);
        typed.send("hello".to_string()).await.unwrap();
        operator_input.send("hi alice".to_string()).await.unwrap();
        typed.send("\\quit".to_string()).await.unwrap();

        let end = run(client_side, "alice", &mut client_lines, &client_out.console())
            .await
            .unwrap();
        assert_eq!(end, ClientEnd::LocalQuit);
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerLeft);

        assert_eq!(
            client_out.contents(),
            "Connection established with: Server-1\n\
             alice> Server-1> hi alice\n\
             alice> alice left the chat\n"
        );
        assert!(server_out.contents().contains("alice> hello\n"));
    }

    #[tokio::test]
    async fn test_server_quit_ends_client() {
        let (mut server, client_side) = duplex(1024);
        let client_out = CaptureBuffer::default();
        let (typed, mut lines) = mpsc::channel(4);
        typed.send("hello".to_string()).await.unwrap();

        let server_task = tokio::spawn(async move {
            assert_eq!(&recv_frame(&mut server, None).await.unwrap()[..], b"bob");
            send_frame(&mut server, b"Server-7").await.unwrap();
            assert_eq!(&recv_frame(&mut server, None).await.unwrap()[..], b"hello");
            send_frame(&mut server, b"\\quit").await.unwrap();
        });

        let end = run(client_side, "bob", &mut lines, &client_out.console())
            .await
            .unwrap();
        server_task.await.unwrap();
        assert_eq!(end, ClientEnd::ServerLeft);
        assert!(client_out.contents().ends_with("Server-7 left the chat\n"));
    }

    #[tokio::test]
    async fn test_long_message_truncated() {
        let (mut server, client_side) = duplex(4096);
        let (typed, mut lines) = mpsc::channel(4);
        typed.send("x".repeat(MAX_MESSAGE_LEN + 100)).await.unwrap();
        typed.send("\\quit".to_string()).await.unwrap();

        let server_task = tokio::spawn(async move {
            recv_frame(&mut server, None).await.unwrap();
            send_frame(&mut server, b"Server-1").await.unwrap();
            let message = recv_frame(&mut server, None).await.unwrap();
            send_frame(&mut server, b"ok").await.unwrap();
            assert_eq!(&recv_frame(&mut server, None).await.unwrap()[..], b"\\quit");
            message.len()
        });

        let end = run(client_side, "eve", &mut lines, &CaptureBuffer::default().console())
            .await
            .unwrap();
        assert_eq!(end, ClientEnd::LocalQuit);
        assert_eq!(server_task.await.unwrap(), MAX_MESSAGE_LEN);
    }
}
