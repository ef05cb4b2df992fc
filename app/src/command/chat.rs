//! Chat turn command.
//!
//! Without a conversation id a new conversation is started; its id is shown
//! with the end or interrupt event so it can be resumed or continued.

use drafter_conversation::ChatTurnRequest;
use drafter_core::Reference;

use super::{init_orchestrator, run_turn};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    pub message: String,
    /// Conversation to continue (creates new if not provided)
    pub conversation_id: Option<String>,
    pub user_id: i64,
    /// File names under the upload directory
    pub references: Vec<String>,
    pub json: bool,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let orchestrator = init_orchestrator().await?;
        let request = ChatTurnRequest {
            conversation_id: input.conversation_id,
            user_id: input.user_id,
            input: input.message,
            references: input.references.into_iter().map(Reference::file).collect(),
        };

        run_turn(input.json, |mut relay| async move {
            orchestrator.run_chat(request, &mut relay).await
        })
        .await
    }
}
