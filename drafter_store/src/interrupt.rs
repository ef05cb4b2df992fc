use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use drafter_core::{InterruptStore, TurnError, interrupt_key};
use drafter_entities::interrupts;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

fn unavailable(err: impl std::fmt::Display) -> TurnError {
    TurnError::CorrelationStoreUnavailable(err.to_string())
}

/// Interruption tokens kept in the `interrupts` table.
///
/// A take reads the live row and then deletes it conditioned on the token it
/// read, so only one of several concurrent takers sees a deleted row.
#[derive(Clone)]
pub struct DatabaseInterruptStore {
    db: DatabaseConnection,
}

impl DatabaseInterruptStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InterruptStore for DatabaseInterruptStore {
    async fn put(
        &self,
        conversation_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), TurnError> {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| unavailable(format!("ttl out of range: {ttl:?}")))?;

        interrupts::Entity::insert(interrupts::ActiveModel {
            conversation_id: Set(conversation_id.to_string()),
            event_id: Set(token.to_string()),
            expires_at: Set(expires_at.naive_utc()),
        })
        .on_conflict(
            OnConflict::column(interrupts::Column::ConversationId)
                .update_columns([interrupts::Column::EventId, interrupts::Column::ExpiresAt])
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .map_err(unavailable)?;

        info!("Stored {}", interrupt_key(conversation_id));
        Ok(())
    }

    async fn take_once(&self, conversation_id: &str) -> Result<String, TurnError> {
        let no_pending = || TurnError::NoPendingInterruption(conversation_id.to_string());

        let row = interrupts::Entity::find_by_id(conversation_id.to_owned())
            .one(&self.db)
            .await
            .map_err(unavailable)?
            .ok_or_else(no_pending)?;

        let deleted = interrupts::Entity::delete_many()
            .filter(interrupts::Column::ConversationId.eq(conversation_id))
            .filter(interrupts::Column::EventId.eq(row.event_id.as_str()))
            .exec(&self.db)
            .await
            .map_err(unavailable)?;

        if deleted.rows_affected != 1 {
            debug!("Lost race for {}", interrupt_key(conversation_id));
            return Err(no_pending());
        }
        if row.expires_at.and_utc() <= Utc::now() {
            debug!("Expired {}", interrupt_key(conversation_id));
            return Err(no_pending());
        }
        Ok(row.event_id)
    }
}

/// Process-local token store.
#[derive(Default)]
pub struct MemoryInterruptStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryInterruptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterruptStore for MemoryInterruptStore {
    async fn put(
        &self,
        conversation_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), TurnError> {
        let deadline = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| unavailable(format!("ttl out of range: {ttl:?}")))?;
        self.entries
            .insert(interrupt_key(conversation_id), (token.to_string(), deadline));
        Ok(())
    }

    async fn take_once(&self, conversation_id: &str) -> Result<String, TurnError> {
        let key = interrupt_key(conversation_id);
        let now = Instant::now();

        if let Some((_, (token, _))) = self
            .entries
            .remove_if(&key, |_, (_, deadline)| *deadline > now)
        {
            return Ok(token);
        }
        self.entries
            .remove_if(&key, |_, (_, deadline)| *deadline <= now);
        Err(TurnError::NoPendingInterruption(conversation_id.to_string()))
    }
}
