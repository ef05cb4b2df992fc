//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own input type. The turn
//! commands share the wiring in [`init_orchestrator`] and [`run_turn`].

use drafter_config::Config;
use drafter_conversation::{TurnConfig, TurnOrchestrator};
use drafter_core::{TurnError, TurnOutcome};
use drafter_providers::XingchenClient;
use drafter_store::DatabaseStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::reader::FsReferenceReader;
use crate::relay::{OutputFormat, StdoutRelay};

mod chat;
mod edit;
mod init;
mod resume;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use edit::{EditInput, EditStrategy};
pub use init::InitStrategy;
pub use resume::{ResumeInput, ResumeStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// parameters are passed without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Build the orchestrator from `~/drafter/config.json`.
async fn init_orchestrator() -> anyhow::Result<TurnOrchestrator> {
    let config = Config::load()?;
    info!("Loaded config from ~/drafter/config.json");

    let upstream = config.upstream;
    let client = Arc::new(
        XingchenClient::new(
            upstream.api_key,
            upstream.api_secret,
            Duration::from_secs(upstream.timeout_secs),
        )?
        .with_api_url(upstream.api_url)
        .with_resume_url(upstream.resume_url)
        .with_upload_url(upstream.upload_url)
        .with_upload_dir(config.upload.base_dir.clone()),
    );

    let store = DatabaseStore::new(&config.database.url).await?;
    let interrupts = Arc::new(store.interrupt_store());

    let turn = config.turn;
    let turn_config = TurnConfig::new(upstream.flow_id)
        .with_history_limit(turn.history_limit)
        .with_title_max_chars(turn.title_max_chars)
        .with_interrupt_ttl(Duration::from_secs(turn.interrupt_ttl_secs))
        .with_reference_max_chars(turn.reference_max_chars);

    Ok(
        TurnOrchestrator::new(client.clone(), Arc::new(store), interrupts, turn_config)
            .with_reference_reader(Arc::new(FsReferenceReader::new(config.upload.base_dir)))
            .with_image_uploader(client),
    )
}

/// Drive one turn to stdout, cancelling it on Ctrl-C.
async fn run_turn<F, Fut>(json: bool, turn: F) -> anyhow::Result<()>
where
    F: FnOnce(StdoutRelay) -> Fut,
    Fut: Future<Output = Result<TurnOutcome, TurnError>>,
{
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling turn");
            on_signal.cancel();
        }
    });

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let outcome = turn(StdoutRelay::new(&cancel, format)).await?;
    match &outcome {
        TurnOutcome::Completed { produced_id, .. } => info!(
            "Turn completed in conversation {} (produced: {})",
            outcome.conversation_id(),
            produced_id.as_deref().unwrap_or("nothing")
        ),
        TurnOutcome::Interrupted { conversation_id } => {
            info!("Waiting for confirmation in conversation {conversation_id}");
        }
        TurnOutcome::Abandoned { conversation_id } => {
            info!("Turn abandoned in conversation {conversation_id}");
        }
    }
    Ok(())
}
