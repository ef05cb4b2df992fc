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

//! Relational persistence for conversations, messages and documents, plus
//! the single-use interruption token stores.

mod database;
mod interrupt;

pub use database::DatabaseStore;
pub use interrupt::{DatabaseInterruptStore, MemoryInterruptStore};
