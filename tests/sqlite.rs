//! Lifecycle scenario against an in-memory SQLite database.

mod common;

use entity_access::{DataAccess, DbConfig, DbType, QueryOption, QueryOptions};

async fn session() -> entity_access::Session {
    let access = DataAccess::sqlite_memory().await.unwrap();
    common::prepare(&access).await
}

#[tokio::test]
async fn insert_and_read_back() {
    common::insert_and_read_back(&session().await).await;
}

#[tokio::test]
async fn update_lifecycle() {
    common::update_lifecycle(&session().await).await;
}

#[tokio::test]
async fn soft_delete_and_restore() {
    common::soft_delete_and_restore(&session().await).await;
}

#[tokio::test]
async fn relationships() {
    common::relationships(&session().await).await;
}

#[tokio::test]
async fn listing() {
    common::listing(&session().await).await;
}

#[tokio::test]
async fn keys() {
    common::keys(&session().await).await;
}

#[tokio::test]
async fn direct_keys_keep_generated_keys_unique() {
    common::direct_keys_keep_generated_keys_unique(&session().await).await;
}

#[tokio::test]
async fn key_types() {
    common::key_types(&session().await).await;
}

#[tokio::test]
async fn negated_comparisons_skip_null() {
    common::negated_comparisons_skip_null(&session().await).await;
}

#[tokio::test]
async fn update_changes_key_lists_by_difference() {
    common::update_changes_key_lists_by_difference(&session().await).await;
}

#[tokio::test]
async fn cascading_delete() {
    common::cascading_delete(&session().await).await;
}

#[tokio::test]
async fn connect_from_config_and_recreate_tables() {
    let access = DataAccess::connect(&DbConfig::new(DbType::Sqlite)).await.unwrap();
    let session = common::prepare(&access).await;
    let _scope = session.scope();
    session
        .insert(
            &common::Book {
                title: "kept?".into(),
                ..Default::default()
            },
            &QueryOptions::new(),
        )
        .await
        .unwrap();
    // create-drop starts from an empty table
    session
        .create_table::<common::Book>(&QueryOptions::new().with(QueryOption::CreateDropTable))
        .await
        .unwrap();
    assert_eq!(session.count::<common::Book>(&QueryOptions::new()).await.unwrap(), 0);

    session.drop_table::<common::Book>(&QueryOptions::new()).await.unwrap();
    let err = session.count::<common::Book>(&QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, entity_access::AccessError::Backend { .. }));
}

#[tokio::test]
async fn table_override_and_column_rename() {
    let access = DataAccess::sqlite_memory().await.unwrap();
    let session = access.session();
    let archive = QueryOptions::new()
        .with(QueryOption::table("book_archive"))
        .with(QueryOption::rename("title", "heading"));
    session.create_table::<common::Book>(&archive).await.unwrap();
    let stored = session
        .insert(
            &common::Book {
                title: "Old".into(),
                ..Default::default()
            },
            &archive,
        )
        .await
        .unwrap();
    assert_eq!(stored.title, "Old");
    let found: Vec<common::Book> = session
        .gets(&archive.clone().with(QueryOption::condition(entity_access::Condition::eq("title", "Old"))))
        .await
        .unwrap();
    assert_eq!(found, vec![stored]);
}
