//! Chat controller
//!
//! `ChatApp` owns the [`ChatState`] and is the only place it changes. It:
//! 1. Loads saved conversations and the model directory
//! 2. Gates submissions and opens one streaming session per message
//! 3. Applies session events in arrival order through the reducer
//! 4. Persists the conversation when a reply ends, without waiting for it

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::backend::{Backend, BackendError};
use crate::config::Config;
use crate::conversation::{Conversation, NewConversation, Turn};

use super::reducer::Reducer;
use super::session::{self, ClientFrame, ServerFrame, SessionEvent, SessionId, SessionMessage};
use super::state::{ActiveSession, ChatState, Rejection};
use super::SessionState;

/// Everything that can change the chat state after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Session(SessionMessage),
    Saved(Conversation),
    SaveFailed,
}

impl From<SessionMessage> for AppEvent {
    fn from(message: SessionMessage) -> Self {
        AppEvent::Session(message)
    }
}

pub struct ChatApp {
    config: Config,
    backend: Arc<dyn Backend>,
    reducer: Reducer,
    state: ChatState,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    next_session: SessionId,
    pending_saves: usize,
}

impl ChatApp {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reducer = Reducer::new(config.code_language.clone(), config.fence_detection);
        Self {
            config,
            backend,
            reducer,
            state: ChatState::new(),
            events_tx,
            events_rx,
            next_session: 1,
            pending_saves: 0,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch saved conversations and the model directory, once
    pub async fn load(&mut self) {
        let (conversations, directory) =
            tokio::join!(self.backend.list_conversations(), self.backend.list_models());

        match conversations {
            Ok(conversations) => {
                tracing::info!(count = conversations.len(), "conversations loaded");
                self.state.conversations = conversations;
            }
            Err(e) => tracing::error!(error = %e, "failed to load conversations"),
        }

        match directory {
            Ok(directory) => {
                let reported = directory.reported_status();
                let models = directory.model_names();
                self.state
                    .apply_models(reported, directory.message, models, &self.config.welcome_message);
            }
            Err(e) => {
                tracing::error!(error = %e, "model directory unreachable");
                self.state.apply_models_unreachable();
            }
        }
    }

    /// Submit a user message and open a streaming session for it.
    ///
    /// A refused submission leaves a system notice in the turn list,
    /// except for blank input.
    pub fn send(&mut self, text: &str) -> Result<SessionId, Rejection> {
        let model = match self.state.check_submission(text) {
            Ok(model) => model,
            Err(rejection) => {
                tracing::debug!(?rejection, "submission refused");
                if let Some(notice) = rejection.notice() {
                    self.state.push_notice(notice);
                }
                return Err(rejection);
            }
        };

        self.state.first_message = false;
        self.state.turns.push(Turn::user(text));

        let id = self.next_session;
        self.next_session += 1;
        self.state.active = Some(ActiveSession {
            id,
            state: SessionState::Connecting,
            model: model.clone(),
            message: text.to_string(),
        });

        session::spawn(
            id,
            self.config.socket_url(),
            ClientFrame {
                model,
                content: text.to_string(),
            },
            self.events_tx.clone(),
        );
        Ok(id)
    }

    pub fn select_model(&mut self, name: &str) -> bool {
        self.state.select_model(name)
    }

    pub fn select_conversation(&mut self, id: i64) -> bool {
        self.state.select_conversation(id)
    }

    pub fn conversation(&self, id: i64) -> Option<&Conversation> {
        self.state.conversation(id)
    }

    pub fn history(&self) -> Vec<&Conversation> {
        self.state.history()
    }

    /// Ask the backend to close the host window. Failures are only logged.
    pub async fn exit(&self) -> Result<(), BackendError> {
        let result = self.backend.exit().await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "failed to exit");
        }
        result
    }

    /// A session is in flight or a save has not reported back
    pub fn is_busy(&self) -> bool {
        self.state.active.is_some() || self.pending_saves > 0
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events_rx.recv().await
    }

    /// Process events until nothing is in flight
    pub async fn settle(&mut self) {
        while self.is_busy() {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Session(message) => self.handle_session(message),
            AppEvent::Saved(saved) => {
                self.pending_saves = self.pending_saves.saturating_sub(1);
                tracing::info!(id = saved.id, title = %saved.title, "conversation saved");
                self.state.record_saved(saved);
            }
            AppEvent::SaveFailed => {
                self.pending_saves = self.pending_saves.saturating_sub(1);
            }
        }
    }

    fn handle_session(&mut self, SessionMessage { id, event }: SessionMessage) {
        let (previous, model, message) = match self.state.active {
            Some(ref active) if active.id == id => {
                (active.state, active.model.clone(), active.message.clone())
            }
            _ => {
                tracing::debug!(session = id, ?event, "dropping event for inactive session");
                return;
            }
        };
        let next = previous.advance(&event);

        match event {
            SessionEvent::Opened => {
                if previous == SessionState::Connecting {
                    self.state.turns.push(Turn::assistant(""));
                }
            }
            SessionEvent::Frame(ServerFrame::Stream { content }) => {
                if previous == SessionState::Streaming {
                    let turns = std::mem::take(&mut self.state.turns);
                    self.state.turns = self.reducer.reduce(turns, &content);
                } else {
                    tracing::warn!(session = id, "stream frame before the session opened");
                }
            }
            SessionEvent::Frame(ServerFrame::Error { content }) => {
                self.state.push_notice(&format!("Error: {}", content));
            }
            SessionEvent::Frame(ServerFrame::End) => {
                if next == SessionState::Completed {
                    self.persist(&message, &model);
                }
            }
            SessionEvent::TransportError { failure, detail } => {
                tracing::warn!(session = id, %detail, "session transport failed");
                self.state.push_notice(failure.notice());
            }
            SessionEvent::Closed => {
                tracing::warn!(session = id, "socket closed before the reply ended");
            }
        }

        if next.is_terminal() {
            tracing::info!(session = id, state = ?next, "session finished");
            self.state.active = None;
        } else if let Some(ref mut active) = self.state.active {
            active.state = next;
        }
    }

    fn persist(&mut self, message: &str, model: &str) {
        let draft = NewConversation::from_exchange(message, model, self.state.turns.clone());
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        self.pending_saves += 1;

        tokio::spawn(async move {
            let event = match backend.save_conversation(&draft).await {
                Ok(saved) => AppEvent::Saved(saved),
                Err(e) => {
                    tracing::error!(error = %e, title = %draft.title, "failed to save conversation");
                    AppEvent::SaveFailed
                }
            };
            let _ = tx.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ModelDirectory, ModelInfo};
    use crate::conversation::Role;
    use crate::core::{TransportFailure, NOTICE_BUSY, NOTICE_DIRECTORY_FAILED, NOTICE_UNAVAILABLE};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        directory: Option<ModelDirectory>,
        conversations: Vec<Conversation>,
        fail_save: bool,
        saved: Mutex<Vec<NewConversation>>,
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
            Ok(self.conversations.clone())
        }

        async fn save_conversation(
            &self,
            draft: &NewConversation,
        ) -> Result<Conversation, BackendError> {
            if self.fail_save {
                return Err(BackendError::InvalidResponse("500: boom".into()));
            }
            let mut saved = self.saved.lock().unwrap();
            saved.push(draft.clone());
            Ok(Conversation {
                id: saved.len() as i64,
                title: draft.title.clone(),
                summary: draft.summary.clone(),
                messages: draft.messages.clone(),
            })
        }

        async fn list_models(&self) -> Result<ModelDirectory, BackendError> {
            self.directory
                .clone()
                .ok_or_else(|| BackendError::InvalidResponse("connection refused".into()))
        }

        async fn exit(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn directory(status: &str, models: &[&str]) -> ModelDirectory {
        ModelDirectory {
            status: Some(status.into()),
            message: None,
            models: models
                .iter()
                .map(|name| ModelInfo {
                    name: name.to_string(),
                    modified_at: None,
                })
                .collect(),
        }
    }

    fn app_with(backend: FakeBackend) -> (ChatApp, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        // Sessions spawned by these tests fail fast: no port in an http url
        let config = Config {
            ws_url: Some("http://127.0.0.1/ws".into()),
            ..Config::default()
        };
        (ChatApp::new(config, backend.clone()), backend)
    }

    fn session(id: SessionId, event: SessionEvent) -> AppEvent {
        AppEvent::Session(SessionMessage { id, event })
    }

    fn stream(id: SessionId, content: &str) -> AppEvent {
        session(
            id,
            SessionEvent::Frame(ServerFrame::Stream {
                content: content.into(),
            }),
        )
    }

    #[tokio::test]
    async fn test_load_single_model() {
        let (mut app, _) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        assert_eq!(app.state().selected_model.as_deref(), Some("llama2"));
        assert!(!app.state().first_message);
        assert_eq!(
            app.state().turns,
            vec![Turn::system("Welcome to AI Desktop Assistant")]
        );
    }

    #[tokio::test]
    async fn test_load_unreachable_directory() {
        let (mut app, _) = app_with(FakeBackend::default());
        app.load().await;

        assert_eq!(app.state().turns, vec![Turn::system(NOTICE_DIRECTORY_FAILED)]);
        assert_eq!(app.send("Hi"), Err(Rejection::Unavailable));
        assert_eq!(app.state().turns.len(), 2);
        assert_eq!(app.state().turns[1].content, NOTICE_UNAVAILABLE);
        assert!(!app.is_busy());
    }

    #[tokio::test]
    async fn test_streamed_exchange_is_saved() {
        let (mut app, backend) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(id, SessionEvent::Opened));
        app.handle_event(stream(id, "Hel"));
        app.handle_event(stream(id, "lo!"));
        app.handle_event(session(id, SessionEvent::Frame(ServerFrame::End)));
        assert!(app.state().active.is_none());

        app.settle().await;

        let turns = &app.state().turns;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("Hi"));
        assert_eq!(turns[2], Turn::assistant("Hello!"));

        let saved = backend.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "Hi...");
        assert_eq!(saved[0].summary, "Chat with llama2");
        assert_eq!(saved[0].messages, *turns);
        assert_eq!(app.history().len(), 1);
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_is_refused() {
        let (mut app, _) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(id, SessionEvent::Opened));
        assert_eq!(app.send("Again"), Err(Rejection::Busy));

        let last = app.state().turns.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, NOTICE_BUSY);
    }

    #[tokio::test]
    async fn test_error_frame_adds_notice_and_frees_session() {
        let (mut app, _) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(id, SessionEvent::Opened));
        app.handle_event(session(
            id,
            SessionEvent::Frame(ServerFrame::Error {
                content: "Ollama API error: 500".into(),
            }),
        ));

        assert!(app.state().active.is_none());
        let last = app.state().turns.last().unwrap();
        assert_eq!(last.content, "Error: Ollama API error: 500");

        // Late frames from the finished session are ignored
        app.handle_event(stream(id, "late"));
        assert_eq!(app.state().turns.last().unwrap().content, "Error: Ollama API error: 500");
    }

    #[tokio::test]
    async fn test_close_before_end_frees_session_quietly() {
        let (mut app, backend) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(id, SessionEvent::Opened));
        app.handle_event(stream(id, "Partial"));
        let before = app.state().turns.clone();

        app.handle_event(session(id, SessionEvent::Closed));

        assert!(app.state().active.is_none());
        assert!(!app.is_busy());
        assert_eq!(app.state().turns, before);
        assert_eq!(app.state().turns.last().unwrap(), &Turn::assistant("Partial"));
        assert!(backend.saved.lock().unwrap().is_empty());
        assert!(app.history().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_notice() {
        let (mut app, _) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(
            id,
            SessionEvent::TransportError {
                failure: TransportFailure::Connection,
                detail: "refused".into(),
            },
        ));

        assert!(!app.is_busy());
        assert_eq!(
            app.state().turns.last().unwrap().content,
            "Failed to connect to the chat service. Please try again."
        );
    }

    #[tokio::test]
    async fn test_save_failure_is_silent() {
        let (mut app, backend) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            fail_save: true,
            ..Default::default()
        });
        app.load().await;

        let id = app.send("Hi").unwrap();
        app.handle_event(session(id, SessionEvent::Opened));
        app.handle_event(stream(id, "Hello"));
        app.handle_event(session(id, SessionEvent::Frame(ServerFrame::End)));
        let before = app.state().turns.clone();

        app.settle().await;

        assert_eq!(app.state().turns, before);
        assert!(app.history().is_empty());
        assert!(backend.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_socket_reports_notice() {
        let (mut app, _) = app_with(FakeBackend {
            directory: Some(directory("single_model", &["llama2"])),
            ..Default::default()
        });
        app.load().await;

        app.send("Hi").unwrap();
        app.settle().await;

        let turns = &app.state().turns;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, Role::System);
        assert_eq!(
            turns[2].content,
            "Failed to establish connection. Please try again."
        );
    }
}
