//! Turn orchestrator for streaming document generation.
//!
//! The `TurnOrchestrator` is the main entry point: it validates the
//! conversation, builds the upstream request, relays the stream and records
//! the outcome.

use chrono::Utc;
use drafter_core::protocol::{
    ChatParameters, ChatRequest, HistoryEntry, Interruption, ResumeRequest, Translated, translate,
};
use drafter_core::util::new_id;
use drafter_core::{
    ChatStore, ContentType, Conversation, Document, EndFrame, ErrorFrame, FrameSource,
    GenerationBackend, INTERRUPT_TTL, ImageUploader, InterruptFrame, InterruptStore, Message,
    Reference, ReferenceReader, Role, TurnError, TurnEvent, TurnOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::history::{HistoryWindow, conversation_title};
use crate::references::enrich_input;
use crate::relay::OutboundRelay;

/// Configuration for turn orchestration.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Workflow the engine runs for every chat and edit turn
    pub flow_id: String,
    /// Maximum stored messages sent along as history
    pub history_limit: usize,
    /// Characters of the first input kept in a new conversation's title
    pub title_max_chars: usize,
    /// How long a paused workflow stays resumable
    pub interrupt_ttl: Duration,
    /// Characters of extracted reference text appended to the input
    pub reference_max_chars: usize,
}

impl TurnConfig {
    #[must_use]
    pub const fn new(flow_id: String) -> Self {
        Self {
            flow_id,
            history_limit: 10,
            title_max_chars: 15,
            interrupt_ttl: INTERRUPT_TTL,
            reference_max_chars: 5000,
        }
    }

    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_title_max_chars(mut self, max_chars: usize) -> Self {
        self.title_max_chars = max_chars;
        self
    }

    #[must_use]
    pub const fn with_interrupt_ttl(mut self, ttl: Duration) -> Self {
        self.interrupt_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_reference_max_chars(mut self, max_chars: usize) -> Self {
        self.reference_max_chars = max_chars;
        self
    }
}

/// A chat message, starting a conversation when `conversation_id` is `None`.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub conversation_id: Option<String>,
    pub user_id: i64,
    pub input: String,
    pub references: Vec<Reference>,
}

/// An instruction to rewrite a stored document.
#[derive(Debug, Clone)]
pub struct EditTurnRequest {
    pub conversation_id: String,
    pub user_id: i64,
    pub document_id: String,
    pub instruction: String,
}

/// The user's confirmed outline for a paused workflow.
#[derive(Debug, Clone)]
pub struct ResumeTurnRequest {
    pub conversation_id: String,
    pub user_id: i64,
    pub content: String,
    /// Kind of document to produce, e.g. "meeting notice".
    pub document_type: Option<String>,
}

/// What the stream ended with.
enum StreamEnd {
    Stopped,
    Interrupted(Interruption),
}

/// Reply text accumulated for one turn and whether the caller has seen any of it.
#[derive(Default)]
struct Progress {
    reply: String,
    delivered: bool,
}

/// How a completed reply is recorded.
enum Completion<'a> {
    Chat { metadata: Option<String> },
    Edit { document_id: &'a str },
    Resume,
}

/// Streaming turn orchestrator.
///
/// One call to a `run_*` method drives one turn to completion on the calling
/// task. The orchestrator itself holds no per-turn state and can be shared.
pub struct TurnOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn ChatStore>,
    interrupts: Arc<dyn InterruptStore>,
    reader: Option<Arc<dyn ReferenceReader>>,
    uploader: Option<Arc<dyn ImageUploader>>,
    config: TurnConfig,
}

impl TurnOrchestrator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ChatStore>,
        interrupts: Arc<dyn InterruptStore>,
        config: TurnConfig,
    ) -> Self {
        Self {
            backend,
            store,
            interrupts,
            reader: None,
            uploader: None,
            config,
        }
    }

    #[must_use]
    pub fn with_reference_reader(mut self, reader: Arc<dyn ReferenceReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    #[must_use]
    pub fn with_image_uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Run a chat turn.
    ///
    /// The engine may answer directly or pause with an outline; in the latter
    /// case the turn ends with an interrupt event and the outline is awaited by
    /// [`Self::run_resume`].
    pub async fn run_chat(
        &self,
        request: ChatTurnRequest,
        relay: &mut dyn OutboundRelay,
    ) -> Result<TurnOutcome, TurnError> {
        let ChatTurnRequest {
            conversation_id,
            user_id,
            input,
            references,
        } = request;

        // History is read before this turn's message is written.
        let (conversation_id, history) = match conversation_id {
            Some(id) => {
                self.validate_conversation(user_id, &id).await?;
                let history = self.recent_history(&id).await?;
                (id, history)
            }
            None => (self.create_conversation(user_id, &input).await?, Vec::new()),
        };
        info!("Processing chat turn for conversation: {conversation_id}");

        let (enriched, image) = enrich_input(
            &input,
            &references,
            self.reader.as_deref(),
            self.uploader.as_deref(),
            self.config.reference_max_chars,
        )
        .await;

        let metadata = if references.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&references)
                    .map_err(|e| TurnError::InvalidRequest(e.to_string()))?,
            )
        };

        self.save_message(Message::new(
            &conversation_id,
            Role::User,
            input,
            ContentType::Text,
        ))
        .await?;

        let upstream = ChatRequest {
            flow_id: self.config.flow_id.clone(),
            uid: user_id.to_string(),
            parameters: ChatParameters {
                input: enriched,
                image,
            },
            stream: true,
            chat_id: Some(conversation_id.clone()),
            history,
        };

        let mut progress = Progress::default();
        let result = async {
            let mut frames = self
                .backend
                .open_chat(&upstream, relay.cancellation())
                .await?;
            self.drive(
                &conversation_id,
                frames.as_mut(),
                relay,
                &mut progress,
                Completion::Chat { metadata },
            )
            .await
        }
        .await;

        settle(&conversation_id, relay, progress.delivered, result).await
    }

    /// Run an edit turn against a document of the conversation.
    ///
    /// The engine sees the document text and the instruction but no history.
    pub async fn run_edit(
        &self,
        request: EditTurnRequest,
        relay: &mut dyn OutboundRelay,
    ) -> Result<TurnOutcome, TurnError> {
        let EditTurnRequest {
            conversation_id,
            user_id,
            document_id,
            instruction,
        } = request;
        self.validate_conversation(user_id, &conversation_id).await?;

        let document = self
            .store
            .find_document(&document_id)
            .await
            .map_err(TurnError::Store)?
            .filter(|doc| doc.conversation_id == conversation_id)
            .ok_or(TurnError::DocumentNotFound(document_id))?;
        info!(
            "Processing edit turn for document {} in conversation: {conversation_id}",
            document.document_id
        );

        self.save_message(Message::new(
            &conversation_id,
            Role::User,
            instruction.as_str(),
            ContentType::Text,
        ))
        .await?;

        let upstream = ChatRequest {
            flow_id: self.config.flow_id.clone(),
            uid: user_id.to_string(),
            parameters: ChatParameters {
                input: edit_prompt(&document.content, &instruction),
                image: None,
            },
            stream: true,
            chat_id: None,
            history: Vec::new(),
        };

        let mut progress = Progress::default();
        let result = async {
            let mut frames = self
                .backend
                .open_chat(&upstream, relay.cancellation())
                .await?;
            self.drive(
                &conversation_id,
                frames.as_mut(),
                relay,
                &mut progress,
                Completion::Edit {
                    document_id: &document.document_id,
                },
            )
            .await
        }
        .await;

        settle(&conversation_id, relay, progress.delivered, result).await
    }

    /// Continue a paused workflow with the user's confirmed outline.
    ///
    /// The pending token is consumed before anything is written, so of several
    /// concurrent resumes only one reaches the engine.
    pub async fn run_resume(
        &self,
        request: ResumeTurnRequest,
        relay: &mut dyn OutboundRelay,
    ) -> Result<TurnOutcome, TurnError> {
        let ResumeTurnRequest {
            conversation_id,
            user_id,
            content,
            document_type,
        } = request;
        self.validate_conversation(user_id, &conversation_id).await?;

        let token = self.interrupts.take_once(&conversation_id).await?;
        info!("Resuming conversation: {conversation_id}");

        self.save_message(Message::new(
            &conversation_id,
            Role::User,
            content.as_str(),
            ContentType::DocumentOutline,
        ))
        .await?;

        let upstream =
            ResumeRequest::resume(token, resume_content(document_type.as_deref(), &content));

        let mut progress = Progress::default();
        let result = async {
            let mut frames = self
                .backend
                .open_resume(&upstream, relay.cancellation())
                .await?;
            self.drive(
                &conversation_id,
                frames.as_mut(),
                relay,
                &mut progress,
                Completion::Resume,
            )
            .await
        }
        .await;

        settle(&conversation_id, relay, progress.delivered, result).await
    }

    async fn validate_conversation(
        &self,
        user_id: i64,
        conversation_id: &str,
    ) -> Result<Conversation, TurnError> {
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await
            .map_err(TurnError::Store)?
            .ok_or_else(|| TurnError::ConversationNotFound(conversation_id.to_string()))?;

        if conversation.user_id != user_id {
            return Err(TurnError::ConversationAccessDenied {
                user_id,
                conversation_id: conversation_id.to_string(),
            });
        }
        Ok(conversation)
    }

    async fn create_conversation(&self, user_id: i64, input: &str) -> Result<String, TurnError> {
        let now = Utc::now();
        let conversation = Conversation {
            conversation_id: new_id(),
            user_id,
            title: conversation_title(input, self.config.title_max_chars),
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_conversation(&conversation)
            .await
            .map_err(TurnError::Store)?;
        Ok(conversation.conversation_id)
    }

    async fn recent_history(&self, conversation_id: &str) -> Result<Vec<HistoryEntry>, TurnError> {
        let messages = self
            .store
            .list_messages(conversation_id)
            .await
            .map_err(TurnError::Store)?;
        Ok(HistoryWindow::new(self.config.history_limit).select(&messages))
    }

    async fn save_message(&self, message: Message) -> Result<(), TurnError> {
        self.store
            .insert_message(&message)
            .await
            .map_err(TurnError::Store)
    }

    /// Relay the stream until it stops or pauses, then finish the turn.
    async fn drive(
        &self,
        conversation_id: &str,
        frames: &mut dyn FrameSource,
        relay: &mut dyn OutboundRelay,
        progress: &mut Progress,
        completion: Completion<'_>,
    ) -> Result<TurnOutcome, TurnError> {
        // A resumed workflow is not expected to pause again.
        let accept_interrupts = !matches!(completion, Completion::Resume);
        match pump(frames, relay, progress, accept_interrupts).await? {
            StreamEnd::Interrupted(interruption) => {
                self.pause(conversation_id, interruption, relay).await
            }
            StreamEnd::Stopped => {
                let produced_id = self
                    .persist(conversation_id, &progress.reply, completion)
                    .await;
                relay
                    .send(TurnEvent::End(EndFrame {
                        conversation_id: conversation_id.to_string(),
                        produced_id: produced_id.clone().unwrap_or_default(),
                    }))
                    .await?;
                debug!("Turn completed for conversation: {conversation_id}");
                Ok(TurnOutcome::Completed {
                    conversation_id: conversation_id.to_string(),
                    produced_id,
                })
            }
        }
    }

    async fn pause(
        &self,
        conversation_id: &str,
        interruption: Interruption,
        relay: &mut dyn OutboundRelay,
    ) -> Result<TurnOutcome, TurnError> {
        self.interrupts
            .put(conversation_id, &interruption.event_id, self.config.interrupt_ttl)
            .await?;
        info!(
            "Workflow paused ({}) for conversation: {conversation_id}",
            interruption.kind
        );

        relay
            .send(TurnEvent::Interrupt(InterruptFrame {
                conversation_id: conversation_id.to_string(),
                content_type: ContentType::DocumentOutline.as_str().to_string(),
                content: interruption.content,
            }))
            .await?;
        Ok(TurnOutcome::Interrupted {
            conversation_id: conversation_id.to_string(),
        })
    }

    /// Record a completed reply, returning the id of what was written.
    ///
    /// Failures are logged rather than returned: the caller has already seen the
    /// reply and still gets its end event.
    async fn persist(
        &self,
        conversation_id: &str,
        reply: &str,
        completion: Completion<'_>,
    ) -> Option<String> {
        if reply.is_empty() {
            debug!("Empty reply, nothing to persist for conversation: {conversation_id}");
            return None;
        }

        self.record(conversation_id, reply, completion)
            .await
            .inspect_err(|e| {
                error!("Failed to persist reply for conversation {conversation_id}: {e}");
            })
            .ok()
    }

    async fn record(
        &self,
        conversation_id: &str,
        reply: &str,
        completion: Completion<'_>,
    ) -> anyhow::Result<String> {
        match completion {
            Completion::Chat { metadata } => {
                let message = Message::new(
                    conversation_id,
                    Role::Assistant,
                    reply,
                    ContentType::DocumentOutline,
                )
                .with_metadata(metadata);
                self.store.insert_message(&message).await?;
                Ok(message.message_id)
            }
            Completion::Edit { document_id } => {
                let message =
                    Message::new(conversation_id, Role::Assistant, reply, ContentType::Text);
                self.store.insert_message(&message).await?;
                self.store
                    .update_document_content(document_id, reply)
                    .await?;
                Ok(document_id.to_string())
            }
            Completion::Resume => {
                let message = Message::new(
                    conversation_id,
                    Role::Assistant,
                    reply,
                    ContentType::FinalDocument,
                );
                self.store.insert_message(&message).await?;
                self.store
                    .insert_document(&Document {
                        document_id: message.message_id.clone(),
                        conversation_id: conversation_id.to_string(),
                        content: reply.to_string(),
                        created_at: message.created_at,
                        updated_at: message.created_at,
                    })
                    .await?;
                Ok(message.message_id)
            }
        }
    }
}

/// Map a finished turn to what the caller gets back.
///
/// Disconnects abandon the turn quietly. Other failures are reported in
/// band when the caller has already received part of the reply.
async fn settle(
    conversation_id: &str,
    relay: &mut dyn OutboundRelay,
    delivered: bool,
    result: Result<TurnOutcome, TurnError>,
) -> Result<TurnOutcome, TurnError> {
    let err = match result {
        Ok(outcome) => return Ok(outcome),
        Err(e) if e.is_disconnect() => {
            info!("Caller went away, abandoning turn for conversation {conversation_id}: {e}");
            relay.cancellation().cancel();
            return Ok(TurnOutcome::Abandoned {
                conversation_id: conversation_id.to_string(),
            });
        }
        Err(e) => e,
    };

    error!("Turn failed for conversation {conversation_id}: {err}");
    if delivered {
        let frames = [
            TurnEvent::Error(ErrorFrame {
                code: err.code(),
                message: err.to_string(),
            }),
            TurnEvent::End(EndFrame {
                conversation_id: conversation_id.to_string(),
                produced_id: String::new(),
            }),
        ];
        for frame in frames {
            if let Err(e) = relay.send(frame).await {
                debug!("Could not report failure to caller: {e}");
                break;
            }
        }
    }
    Err(err)
}

/// Read frames until the engine stops or pauses, relaying every delta.
async fn pump(
    frames: &mut dyn FrameSource,
    relay: &mut dyn OutboundRelay,
    progress: &mut Progress,
    accept_interrupts: bool,
) -> Result<StreamEnd, TurnError> {
    loop {
        let Some(payload) = frames.next_frame().await? else {
            return Err(TurnError::UpstreamTransportError(
                "stream ended before a terminal frame".to_string(),
            ));
        };

        match translate(&payload)? {
            Translated::Skip => {}
            Translated::Delta(text) => relay_delta(relay, progress, text).await?,
            Translated::Interrupt(interruption) if accept_interrupts => {
                return Ok(StreamEnd::Interrupted(interruption));
            }
            Translated::Interrupt(interruption) => {
                warn!(
                    "Ignoring interrupt {} on a resumed stream",
                    interruption.event_id
                );
            }
            Translated::Stop { delta } => {
                if let Some(text) = delta {
                    relay_delta(relay, progress, text).await?;
                }
                return Ok(StreamEnd::Stopped);
            }
        }
    }
}

async fn relay_delta(
    relay: &mut dyn OutboundRelay,
    progress: &mut Progress,
    text: String,
) -> Result<(), TurnError> {
    progress.reply.push_str(&text);
    relay.send(TurnEvent::Message(text)).await?;
    progress.delivered = true;
    Ok(())
}

fn edit_prompt(original: &str, instruction: &str) -> String {
    format!(
        "Edit: revise the document below according to the instruction.\n\n\
         Original:\n{original}\n\nInstruction: {instruction}"
    )
}

fn resume_content(document_type: Option<&str>, content: &str) -> String {
    match document_type.map(str::trim).filter(|hint| !hint.is_empty()) {
        Some(hint) => format!("Document type: {hint}\n{content}"),
        None => content.to_string(),
    }
}
