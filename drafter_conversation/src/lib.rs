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

//! Streaming turn orchestration for document generation.
//!
//! A turn opens one upstream call, relays its content to the caller as it
//! arrives and either completes (persisting the reply) or pauses on an
//! interruption that a later resume turn continues.
//!
//! # Turn kinds
//! - `run_chat`: first or follow-up message, may pause with an outline
//! - `run_edit`: rewrite an existing document from an instruction
//! - `run_resume`: continue a paused workflow with the confirmed outline

mod history;
mod orchestrator;
mod references;
mod relay;

pub use history::{HistoryWindow, conversation_title};
pub use orchestrator::{
    ChatTurnRequest, EditTurnRequest, ResumeTurnRequest, TurnConfig, TurnOrchestrator,
};
pub use references::{ReferenceKind, enrich_input};
pub use relay::{ChannelRelay, OutboundRelay};
