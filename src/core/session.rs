//! Streaming session over the chat socket
//!
//! Each submitted message opens its own WebSocket connection. A spawned task
//! owns the socket, sends the single request frame and forwards every
//! response frame as a [`SessionEvent`] over a channel, so the owner of the
//! chat state applies them strictly in arrival order.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::{self, Message};

pub type SessionId = u64;

/// Request frame, sent once right after the connection opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub model: String,
    pub content: String,
}

/// Response frames sent by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Incremental assistant output
    Stream { content: String },
    /// End of the assistant turn
    End,
    /// Error reported by the backend or the model runtime
    Error {
        #[serde(default)]
        content: String,
    },
}

/// Why the connection could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The connection request could not even be built
    Establish,
    /// Connecting, sending or reading failed
    Connection,
}

impl TransportFailure {
    /// Notice shown to the user
    pub fn notice(self) -> &'static str {
        match self {
            TransportFailure::Establish => "Failed to establish connection. Please try again.",
            TransportFailure::Connection => {
                "Failed to connect to the chat service. Please try again."
            }
        }
    }

    fn classify(err: &tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_) => {
                TransportFailure::Establish
            }
            _ => TransportFailure::Connection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connected and the request frame was sent
    Opened,
    Frame(ServerFrame),
    TransportError {
        failure: TransportFailure,
        detail: String,
    },
    /// The socket closed
    Closed,
}

/// Event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub id: SessionId,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Next state after `event`. Terminal states absorb everything.
    pub fn advance(self, event: &SessionEvent) -> SessionState {
        use SessionState::*;

        match (self, event) {
            (Completed | Failed, _) => self,
            (_, SessionEvent::TransportError { .. }) | (_, SessionEvent::Closed) => Failed,
            (Connecting, SessionEvent::Opened) => Streaming,
            (Connecting, SessionEvent::Frame(_)) => Connecting,
            (Streaming, SessionEvent::Opened) => Streaming,
            (Streaming, SessionEvent::Frame(ServerFrame::Stream { .. })) => Streaming,
            (Streaming, SessionEvent::Frame(ServerFrame::End)) => Completed,
            (Streaming, SessionEvent::Frame(ServerFrame::Error { .. })) => Failed,
        }
    }
}

/// Open a session on its own task.
///
/// Events are delivered as `E` so the caller can multiplex them with its
/// other events on a single channel.
pub fn spawn<E>(id: SessionId, url: String, request: ClientFrame, tx: UnboundedSender<E>)
where
    E: From<SessionMessage> + Send + 'static,
{
    tokio::spawn(async move {
        let emit = |event: SessionEvent| {
            if tx.send(E::from(SessionMessage { id, event })).is_err() {
                tracing::debug!(session = id, "session event receiver dropped");
            }
        };
        run(id, &url, &request, emit).await;
    });
}

async fn run<F>(id: SessionId, url: &str, request: &ClientFrame, emit: F)
where
    F: Fn(SessionEvent),
{
    tracing::info!(session = id, %url, model = %request.model, "opening chat session");

    let (mut ws, _) = match tokio_tungstenite::connect_async(url).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(session = id, error = %e, "chat socket connection failed");
            emit(SessionEvent::TransportError {
                failure: TransportFailure::classify(&e),
                detail: e.to_string(),
            });
            return;
        }
    };

    let payload = match serde_json::to_string(request) {
        Ok(payload) => payload,
        Err(e) => {
            emit(SessionEvent::TransportError {
                failure: TransportFailure::Establish,
                detail: e.to_string(),
            });
            return;
        }
    };

    if let Err(e) = ws.send(Message::Text(payload)).await {
        tracing::error!(session = id, error = %e, "failed to send request frame");
        emit(SessionEvent::TransportError {
            failure: TransportFailure::classify(&e),
            detail: e.to_string(),
        });
        return;
    }
    emit(SessionEvent::Opened);

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                Ok(frame) => {
                    tracing::debug!(session = id, ?frame, "frame received");
                    let done = matches!(frame, ServerFrame::End | ServerFrame::Error { .. });
                    emit(SessionEvent::Frame(frame));
                    if done {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(session = id, error = %e, "skipping malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            // Ignore binary, ping and pong frames
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(session = id, error = %e, "chat socket error");
                emit(SessionEvent::TransportError {
                    failure: TransportFailure::Connection,
                    detail: e.to_string(),
                });
                return;
            }
        }
    }

    if let Err(e) = ws.close(None).await {
        tracing::debug!(session = id, error = %e, "chat socket close failed");
    }
    tracing::info!(session = id, "chat session closed");
    emit(SessionEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn stream(content: &str) -> SessionEvent {
        SessionEvent::Frame(ServerFrame::Stream {
            content: content.into(),
        })
    }

    #[test]
    fn test_parse_server_frames() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"stream","content":"Hel"}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Stream {
                content: "Hel".into()
            }
        );

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(frame, ServerFrame::End);

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Error {
                content: String::new()
            }
        );

        assert!(serde_json::from_str::<ServerFrame>(r#"{"type":"ready"}"#).is_err());
    }

    #[test]
    fn test_client_frame_shape() {
        let frame = ClientFrame {
            model: "llama2".into(),
            content: "Hi".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"model": "llama2", "content": "Hi"}));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = SessionState::Connecting;
        state = state.advance(&SessionEvent::Opened);
        assert_eq!(state, SessionState::Streaming);
        state = state.advance(&stream("a"));
        assert_eq!(state, SessionState::Streaming);
        state = state.advance(&SessionEvent::Frame(ServerFrame::End));
        assert_eq!(state, SessionState::Completed);
        assert!(state.is_terminal());

        // Close after end does not turn a completed session into a failure
        assert_eq!(state.advance(&SessionEvent::Closed), SessionState::Completed);
    }

    #[test]
    fn test_failure_transitions() {
        let refused = SessionEvent::TransportError {
            failure: TransportFailure::Connection,
            detail: "refused".into(),
        };
        assert_eq!(
            SessionState::Connecting.advance(&refused),
            SessionState::Failed
        );
        assert_eq!(
            SessionState::Streaming.advance(&SessionEvent::Frame(ServerFrame::Error {
                content: "boom".into()
            })),
            SessionState::Failed
        );
        assert_eq!(
            SessionState::Streaming.advance(&SessionEvent::Closed),
            SessionState::Failed
        );
        assert_eq!(
            SessionState::Failed.advance(&stream("late")),
            SessionState::Failed
        );
    }

    #[tokio::test]
    async fn test_invalid_url_reports_establish_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionMessage>();
        spawn(
            7,
            "http://127.0.0.1/ws".into(),
            ClientFrame {
                model: "m".into(),
                content: "c".into(),
            },
            tx,
        );

        let message = rx.recv().await.unwrap();
        assert_eq!(message.id, 7);
        match message.event {
            SessionEvent::TransportError { failure, .. } => {
                assert_eq!(failure, TransportFailure::Establish);
                assert_eq!(
                    failure.notice(),
                    "Failed to establish connection. Please try again."
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
