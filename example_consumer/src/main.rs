//! Example consumer: a separate Rust project that uses entity-access as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Backend comes from `DB_TYPE` and friends (see `.env.example`); without it an in-process store is used.

use chrono::{DateTime, Utc};
use entity_access::{
    Condition, DataAccess, DbConfig, DbType, Entity, EntityKey, ModelBuilder, OrderBy, QueryOption, QueryOptions,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Note {
    id: i64,
    title: String,
    body: Option<String>,
    archived: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Entity for Note {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.table("notes");
        m.field("id").primary_key().bind(|n| &n.id, |n| &mut n.id);
        m.field("title").max_length(120).bind(|n| &n.title, |n| &mut n.title);
        m.field("body").bind(|n| &n.body, |n| &mut n.body);
        m.field("archived").soft_delete().bind(|n| &n.archived, |n| &mut n.archived);
        m.field("created_at").created_at().bind(|n| &n.created_at, |n| &mut n.created_at);
        m.field("updated_at").updated_at().bind(|n| &n.updated_at, |n| &mut n.updated_at);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_access=info")),
        )
        .init();

    let config = DbConfig::from_dotenv().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "no database configured, using the in-process store");
        DbConfig::new(DbType::Memory)
    });
    let access = DataAccess::connect(&config).await?;
    let session = access.session();
    let _scope = session.scope();

    session.create_table::<Note>(&QueryOptions::new()).await?;
    for title in ["groceries", "reading list", "ideas"] {
        let note = Note {
            title: title.to_string(),
            ..Note::default()
        };
        session.insert(&note, &QueryOptions::new()).await?;
    }

    let first: Option<Note> = session.get_by_id(&EntityKey::from(1_i64), &QueryOptions::new()).await?;
    tracing::info!(note = ?first, "first note");

    session
        .delete_where::<Note>(
            &QueryOptions::new().with(QueryOption::condition(Condition::eq("title", "ideas"))),
        )
        .await?;
    let live: Vec<Note> = session
        .gets(&QueryOptions::new().with(QueryOption::order_by([OrderBy::asc("title")])))
        .await?;
    for note in &live {
        tracing::info!(id = note.id, title = %note.title, "live note");
    }
    Ok(())
}
