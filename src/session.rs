use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::render::RenderedImage;

/// Output of a command: a status/error text or a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image(RenderedImage),
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text.as_str()),
            Reply::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&RenderedImage> {
        match self {
            Reply::Text(_) => None,
            Reply::Image(image) => Some(image),
        }
    }
}

impl From<RenderedImage> for Reply {
    fn from(image: RenderedImage) -> Self {
        Reply::Image(image)
    }
}

/// The conversation a command was invoked from
#[async_trait]
pub trait Session: Send {
    /// Send an intermediate reply before the command finishes
    async fn send(&mut self, reply: Reply) -> Result<(), SessionError>;

    /// Wait for the next message from this conversation.
    ///
    /// Returns `None` when nothing arrives within `timeout` or the conversation ends.
    async fn prompt(&mut self, timeout: Duration) -> Result<Option<String>, SessionError>;
}

/// Session backed by a pair of channels: incoming messages and outgoing replies
pub struct ChannelSession {
    incoming: mpsc::Receiver<String>,
    outgoing: mpsc::Sender<Reply>,
}

impl ChannelSession {
    pub fn new(incoming: mpsc::Receiver<String>, outgoing: mpsc::Sender<Reply>) -> Self {
        ChannelSession { incoming, outgoing }
    }

    /// Wait without a deadline for the next message, `None` once input is closed
    pub async fn next_message(&mut self) -> Option<String> {
        self.incoming.recv().await
    }
}

#[async_trait]
impl Session for ChannelSession {
    async fn send(&mut self, reply: Reply) -> Result<(), SessionError> {
        self.outgoing
            .send(reply)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn prompt(&mut self, timeout: Duration) -> Result<Option<String>, SessionError> {
        match tokio::time::timeout(timeout, self.incoming.recv()).await {
            Ok(message) => Ok(message),
            Err(_) => {
                log::debug!("Prompt timed out after {:?}", timeout);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (ChannelSession, mpsc::Sender<String>, mpsc::Receiver<Reply>) {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        (ChannelSession::new(in_rx, out_tx), in_tx, out_rx)
    }

    #[tokio::test]
    async fn prompt_returns_next_message() {
        let (mut session, input, _output) = session();
        input.send("confirm".to_string()).await.unwrap();

        let reply = session.prompt(Duration::from_secs(30)).await.unwrap();
        assert_eq!(reply.as_deref(), Some("confirm"));
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_times_out() {
        let (mut session, _input, _output) = session();

        let reply = session.prompt(Duration::from_secs(30)).await.unwrap();
        assert_eq!(reply, None);
    }

    #[tokio::test(start_paused = true)]
    async fn message_after_deadline_is_not_taken() {
        let (mut session, input, _output) = session();

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(31)).await;
            input.send("confirm".to_string()).await.unwrap();
            input
        });

        assert_eq!(session.prompt(Duration::from_secs(30)).await.unwrap(), None);
        let _input = late.await.unwrap();
        assert_eq!(session.next_message().await.as_deref(), Some("confirm"));
    }

    #[tokio::test]
    async fn closed_input_cancels_prompt() {
        let (mut session, input, _output) = session();
        drop(input);

        assert_eq!(session.prompt(Duration::from_secs(30)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_forwards_replies() {
        let (mut session, _input, mut output) = session();

        session.send(Reply::Text("hello".to_string())).await.unwrap();
        assert_eq!(output.recv().await, Some(Reply::Text("hello".to_string())));
    }

    #[tokio::test]
    async fn send_fails_once_output_is_gone() {
        let (mut session, _input, output) = session();
        drop(output);

        assert!(matches!(
            session.send(Reply::Text("hello".to_string())).await,
            Err(SessionError::Closed)
        ));
    }
}
