#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;
mod reader;
mod relay;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, EditInput, EditStrategy, InitStrategy, ResumeInput,
    ResumeStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "drafter")]
#[command(about = "Streaming document drafting over a workflow engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message, starting a new conversation unless one is given
    Chat {
        /// Message to send
        #[arg(short = 'm', long)]
        message: String,

        /// Conversation to continue
        #[arg(short = 'c', long)]
        conversation: Option<String>,

        /// Caller identity
        #[arg(short = 'u', long, default_value_t = 1)]
        user: i64,

        /// Uploaded file to attach (name under the upload directory), repeatable
        #[arg(short = 'r', long = "reference")]
        references: Vec<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Continue a paused conversation with the confirmed outline
    Resume {
        /// Conversation that was paused
        #[arg(short = 'c', long)]
        conversation: String,

        /// Confirmed or edited outline
        #[arg(short = 'm', long)]
        message: String,

        /// Kind of document to produce
        #[arg(short = 't', long = "type")]
        document_type: Option<String>,

        /// Caller identity
        #[arg(short = 'u', long, default_value_t = 1)]
        user: i64,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a generated document
    Edit {
        /// Conversation the document belongs to
        #[arg(short = 'c', long)]
        conversation: String,

        /// Document to rewrite
        #[arg(short = 'd', long)]
        document: String,

        /// Edit instruction
        #[arg(short = 'm', long)]
        message: String,

        /// Caller identity
        #[arg(short = 'u', long, default_value_t = 1)]
        user: i64,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Events go to stdout; logs stay on stderr.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            conversation,
            user,
            references,
            json,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    conversation_id: conversation,
                    user_id: user,
                    references,
                    json,
                })
                .await
        }
        Commands::Resume {
            conversation,
            message,
            document_type,
            user,
            json,
        } => {
            ResumeStrategy
                .execute(ResumeInput {
                    conversation_id: conversation,
                    content: message,
                    document_type,
                    user_id: user,
                    json,
                })
                .await
        }
        Commands::Edit {
            conversation,
            document,
            message,
            user,
            json,
        } => {
            EditStrategy
                .execute(EditInput {
                    conversation_id: conversation,
                    document_id: document,
                    instruction: message,
                    user_id: user,
                    json,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
