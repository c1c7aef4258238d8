//! Arbitration of the single human operator's console input.
//!
//! Sessions run concurrently but there is only one keyboard. Instead of
//! letting every session race on stdin, one arbitration task owns the line
//! stream and serves prompt requests strictly in arrival order: it prints a
//! session's prompt, waits for the next line, hands it back, and only then
//! moves on to the next queued request.

use crate::console::Console;
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Capacity of the stdin line channel.
const LINE_BUFFER: usize = 16;

struct PromptRequest {
    prompt: String,
    reply: oneshot::Sender<Option<String>>,
}

/// Cloneable handle for requesting operator input.
#[derive(Clone)]
pub struct Operator {
    requests: mpsc::UnboundedSender<PromptRequest>,
}

impl Operator {
    /// Start the arbitration task over a stream of input lines.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(console: Console, lines: mpsc::Receiver<String>) -> Self {
        let (requests, queue) = mpsc::unbounded_channel();
        tokio::spawn(arbitrate(console, queue, lines));
        Self { requests }
    }

    /// Queue for the operator, show `prompt` once it is this caller's turn,
    /// and return the line typed.
    ///
    /// Returns `None` once operator input has ended for good.
    pub async fn read_line(&self, prompt: impl Into<String>) -> Option<String> {
        let (reply, response) = oneshot::channel();
        let request = PromptRequest {
            prompt: prompt.into(),
            reply,
        };
        self.requests.send(request).ok()?;
        response.await.ok().flatten()
    }
}

async fn arbitrate(
    console: Console,
    mut queue: mpsc::UnboundedReceiver<PromptRequest>,
    mut lines: mpsc::Receiver<String>,
) {
    let mut exhausted = false;

    while let Some(request) = queue.recv().await {
        if request.reply.is_closed() {
            // Requesting session is already gone.
            continue;
        }
        if exhausted {
            let _ = request.reply.send(None);
            continue;
        }

        console.prompt(&request.prompt);
        let line = lines.recv().await;
        if line.is_none() {
            debug!("Operator input closed");
            exhausted = true;
        }

        if let Err(Some(line)) = request.reply.send(line) {
            trace!(%line, "Dropping operator line for departed session");
        }
    }
}

/// Forward lines typed on stdin into a channel, without line terminators.
///
/// A dedicated thread does the blocking reads so that runtime shutdown never
/// waits on the keyboard. The channel closes when stdin reaches end of file.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let spawned = thread::Builder::new()
        .name("operator-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        // The sender was dropped with the closure, so readers see end of input.
        warn!(error = %e, "Failed to start stdin reader");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::CaptureBuffer;

    #[tokio::test]
    async fn test_prompt_then_line() {
        let capture = CaptureBuffer::default();
        let (tx, rx) = mpsc::channel(4);
        let operator = Operator::spawn(capture.console(), rx);

        tx.send("hi alice".to_string()).await.unwrap();
        let line = operator.read_line("Server-1> ").await;

        assert_eq!(line.as_deref(), Some("hi alice"));
        assert_eq!(capture.contents(), "Server-1> ");
    }

    #[tokio::test]
    async fn test_requests_served_in_order() {
        let capture = CaptureBuffer::default();
        let (tx, rx) = mpsc::channel(4);
        let operator = Operator::spawn(capture.console(), rx);

        let first = {
            let operator = operator.clone();
            tokio::spawn(async move { operator.read_line("A> ").await })
        };
        // Let the first request reach the queue before the second.
        while capture.contents().is_empty() {
            tokio::task::yield_now().await;
        }
        let second = {
            let operator = operator.clone();
            tokio::spawn(async move { operator.read_line("B> ").await })
        };

        tx.send("one".to_string()).await.unwrap();
        tx.send("two".to_string()).await.unwrap();

        assert_eq!(first.await.unwrap().as_deref(), Some("one"));
        assert_eq!(second.await.unwrap().as_deref(), Some("two"));
        assert_eq!(capture.contents(), "A> B> ");
    }

    #[tokio::test]
    async fn test_closed_input_yields_none() {
        let capture = CaptureBuffer::default();
        let (tx, rx) = mpsc::channel(4);
        let operator = Operator::spawn(capture.console(), rx);
        drop(tx);

        assert_eq!(operator.read_line("Server-1> ").await, None);
        assert_eq!(operator.read_line("Server-2> ").await, None);
        // Only the first prompt is shown; later requests fail fast.
        assert_eq!(capture.contents(), "Server-1> ");
    }
}
