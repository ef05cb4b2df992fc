use async_trait::async_trait;
use chrono::Utc;
use drafter_core::{Conversation, ConversationRepo, Document, DocumentRepo, Message, MessageRepo};
use drafter_entities::{conversations, documents, interrupts, messages};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Schema, Set,
};
use tracing::info;

use crate::interrupt::DatabaseInterruptStore;

/// Conversation, message and document storage over any sea-orm backend.
#[derive(Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        Self::connect(ConnectOptions::new(url)).await
    }

    pub async fn connect(options: ConnectOptions) -> anyhow::Result<Self> {
        let db = Database::connect(options).await?;
        info!("Connected to {:?} database", db.get_database_backend());
        let store = Self { db };
        store.create_tables().await?;

        info!("DatabaseStore initialized");
        Ok(store)
    }

    /// Token store sharing this store's connection pool.
    #[must_use]
    pub fn interrupt_store(&self) -> DatabaseInterruptStore {
        DatabaseInterruptStore::new(self.db.clone())
    }

    async fn create_tables(&self) -> anyhow::Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut statements = [
            schema.create_table_from_entity(conversations::Entity),
            schema.create_table_from_entity(messages::Entity),
            schema.create_table_from_entity(documents::Entity),
            schema.create_table_from_entity(interrupts::Entity),
        ];

        for stmt in &mut statements {
            stmt.if_not_exists();
            self.db
                .execute_unprepared(&backend.build(&*stmt).to_string())
                .await?;
        }
        Ok(())
    }
}

fn conversation_from_model(model: conversations::Model) -> Conversation {
    Conversation {
        conversation_id: model.conversation_id,
        user_id: model.user_id,
        title: model.title,
        created_at: model.created_at.and_utc(),
        updated_at: model.updated_at.and_utc(),
    }
}

fn message_from_model(model: messages::Model) -> anyhow::Result<Message> {
    Ok(Message {
        message_id: model.message_id,
        conversation_id: model.conversation_id,
        role: model.role.parse()?,
        content: model.content,
        content_type: model.content_type.parse()?,
        metadata: model.metadata,
        created_at: model.created_at.and_utc(),
    })
}

fn document_from_model(model: documents::Model) -> Document {
    Document {
        document_id: model.message_id,
        conversation_id: model.conversation_id,
        content: model.content,
        created_at: model.created_at.and_utc(),
        updated_at: model.updated_at.and_utc(),
    }
}

#[async_trait]
impl ConversationRepo for DatabaseStore {
    async fn find_conversation(
        &self,
        conversation_id: &str,
    ) -> anyhow::Result<Option<Conversation>> {
        let model = conversations::Entity::find_by_id(conversation_id.to_owned())
            .one(&self.db)
            .await?;
        Ok(model.map(conversation_from_model))
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> anyhow::Result<()> {
        conversations::Entity::insert(conversations::ActiveModel {
            conversation_id: Set(conversation.conversation_id.clone()),
            user_id: Set(conversation.user_id),
            title: Set(conversation.title.clone()),
            created_at: Set(conversation.created_at.naive_utc()),
            updated_at: Set(conversation.updated_at.naive_utc()),
        })
        .exec_without_returning(&self.db)
        .await?;

        info!("Created conversation: {}", conversation.conversation_id);
        Ok(())
    }
}

#[async_trait]
impl MessageRepo for DatabaseStore {
    async fn insert_message(&self, message: &Message) -> anyhow::Result<()> {
        messages::Entity::insert(messages::ActiveModel {
            message_id: Set(message.message_id.clone()),
            conversation_id: Set(message.conversation_id.clone()),
            role: Set(message.role.as_str().to_string()),
            content: Set(message.content.clone()),
            content_type: Set(message.content_type.as_str().to_string()),
            metadata: Set(message.metadata.clone()),
            created_at: Set(message.created_at.naive_utc()),
        })
        .exec_without_returning(&self.db)
        .await?;

        // Keep the conversation's recency in step with its last message.
        conversations::Entity::update_many()
            .col_expr(
                conversations::Column::UpdatedAt,
                Expr::value(message.created_at.naive_utc()),
            )
            .filter(conversations::Column::ConversationId.eq(message.conversation_id.as_str()))
            .exec(&self.db)
            .await?;

        info!(
            "Added {} message to conversation: {}",
            message.role, message.conversation_id
        );
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>> {
        let models = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::CreatedAt)
            .order_by_asc(messages::Column::MessageId)
            .all(&self.db)
            .await?;

        models.into_iter().map(message_from_model).collect()
    }
}

#[async_trait]
impl DocumentRepo for DatabaseStore {
    async fn find_document(&self, document_id: &str) -> anyhow::Result<Option<Document>> {
        let model = documents::Entity::find_by_id(document_id.to_owned())
            .one(&self.db)
            .await?;
        Ok(model.map(document_from_model))
    }

    async fn insert_document(&self, document: &Document) -> anyhow::Result<()> {
        documents::Entity::insert(documents::ActiveModel {
            message_id: Set(document.document_id.clone()),
            conversation_id: Set(document.conversation_id.clone()),
            content: Set(document.content.clone()),
            created_at: Set(document.created_at.naive_utc()),
            updated_at: Set(document.updated_at.naive_utc()),
        })
        .exec_without_returning(&self.db)
        .await?;

        info!("Saved document: {}", document.document_id);
        Ok(())
    }

    async fn update_document_content(
        &self,
        document_id: &str,
        content: &str,
    ) -> anyhow::Result<()> {
        let result = documents::Entity::update_many()
            .col_expr(documents::Column::Content, Expr::value(content))
            .col_expr(
                documents::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(documents::Column::MessageId.eq(document_id))
            .exec(&self.db)
            .await?;

        // MySQL reports zero affected rows when the content is unchanged.
        if result.rows_affected == 0 && self.find_document(document_id).await?.is_none() {
            anyhow::bail!("Document not found: {document_id}");
        }
        info!("Updated document: {}", document_id);
        Ok(())
    }
}
