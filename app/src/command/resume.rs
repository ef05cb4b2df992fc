use drafter_conversation::ResumeTurnRequest;

use super::{init_orchestrator, run_turn};

/// Input parameters for the Resume command strategy.
#[derive(Debug, Clone)]
pub struct ResumeInput {
    pub conversation_id: String,
    /// The outline as confirmed or edited by the user
    pub content: String,
    pub document_type: Option<String>,
    pub user_id: i64,
    pub json: bool,
}

/// Strategy for continuing a paused conversation.
#[derive(Debug, Clone, Copy)]
pub struct ResumeStrategy;

impl super::CommandStrategy for ResumeStrategy {
    type Input = ResumeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let orchestrator = init_orchestrator().await?;
        let request = ResumeTurnRequest {
            conversation_id: input.conversation_id,
            user_id: input.user_id,
            content: input.content,
            document_type: input.document_type,
        };

        run_turn(input.json, |mut relay| async move {
            orchestrator.run_resume(request, &mut relay).await
        })
        .await
    }
}
