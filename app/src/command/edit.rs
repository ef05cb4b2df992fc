use drafter_conversation::EditTurnRequest;

use super::{init_orchestrator, run_turn};

/// Input parameters for the Edit command strategy.
#[derive(Debug, Clone)]
pub struct EditInput {
    pub conversation_id: String,
    pub document_id: String,
    pub instruction: String,
    pub user_id: i64,
    pub json: bool,
}

/// Strategy for rewriting a generated document.
#[derive(Debug, Clone, Copy)]
pub struct EditStrategy;

impl super::CommandStrategy for EditStrategy {
    type Input = EditInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let orchestrator = init_orchestrator().await?;
        let request = EditTurnRequest {
            conversation_id: input.conversation_id,
            user_id: input.user_id,
            document_id: input.document_id,
            instruction: input.instruction,
        };

        run_turn(input.json, |mut relay| async move {
            orchestrator.run_edit(request, &mut relay).await
        })
        .await
    }
}
