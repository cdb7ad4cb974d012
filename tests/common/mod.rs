//! Entities and the lifecycle scenario shared by the backend integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use entity_access::{
    AccessError, Condition, DataAccess, Entity, EntityKey, FieldKind, ModelBuilder, OnDelete, OrderBy, QueryOption, QueryOptions,
    Session,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
    pub rank: i64,
    pub deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub books: Vec<i64>,
    pub clubs: Vec<i64>,
}

impl Entity for Author {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|a| &a.id, |a| &mut a.id);
        m.field("name").max_length(40).bind(|a| &a.name, |a| &mut a.name);
        m.field("email").bind(|a| &a.email, |a| &mut a.email);
        m.field("bio").not_read().bind(|a| &a.bio, |a| &mut a.bio);
        m.field("status")
            .not_null()
            .default_value("'active'")
            .bind(|a| &a.status, |a| &mut a.status);
        m.field("rank").no_update().bind(|a| &a.rank, |a| &mut a.rank);
        m.field("deleted").soft_delete().bind(|a| &a.deleted, |a| &mut a.deleted);
        m.field("created_at").created_at().bind(|a| &a.created_at, |a| &mut a.created_at);
        m.field("updated_at").updated_at().bind(|a| &a.updated_at, |a| &mut a.updated_at);
        m.field("books").mirrored::<Book>("author_id").bind(|a| &a.books, |a| &mut a.books);
        m.field("clubs").mirrored::<Club>("members").bind(|a| &a.clubs, |a| &mut a.clubs);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Book {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|b| &b.id, |b| &mut b.id);
        m.field("title").bind(|b| &b.title, |b| &mut b.title);
        m.field("author_id").to_one::<Author>().bind(|b| &b.author_id, |b| &mut b.author_id);
        m.field("updated_at").updated_at().bind(|b| &b.updated_at, |b| &mut b.updated_at);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: i64,
    pub name: String,
    pub members: Vec<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Club {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|c| &c.id, |c| &mut c.id);
        m.field("name").bind(|c| &c.name, |c| &mut c.name);
        m.field("members").to_many::<Author>().bind(|c| &c.members, |c| &mut c.members);
        m.field("updated_at").updated_at().bind(|c| &c.updated_at, |c| &mut c.updated_at);
    }
}

/// Bound through serde only.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub label: String,
    pub payload: serde_json::Value,
}

impl Entity for Ticket {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().kind(FieldKind::Uuid);
        m.field("label");
        m.field("payload").kind(FieldKind::Json);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: i64,
    pub label: String,
    pub deleted: bool,
    pub volumes: Vec<i64>,
}

impl Entity for Shelf {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|s| &s.id, |s| &mut s.id);
        m.field("label").bind(|s| &s.label, |s| &mut s.label);
        m.field("deleted").soft_delete().bind(|s| &s.deleted, |s| &mut s.deleted);
        m.field("volumes")
            .mirrored::<Volume>("shelf_id")
            .on_delete(OnDelete::Cascade)
            .bind(|s| &s.volumes, |s| &mut s.volumes);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: i64,
    pub title: String,
    pub shelf_id: Option<i64>,
    pub deleted: bool,
}

impl Entity for Volume {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|v| &v.id, |v| &mut v.id);
        m.field("title").bind(|v| &v.title, |v| &mut v.title);
        m.field("shelf_id").to_one::<Shelf>().bind(|v| &v.shelf_id, |v| &mut v.shelf_id);
        m.field("deleted").soft_delete().bind(|v| &v.deleted, |v| &mut v.deleted);
    }
}

/// 32-bit generated key.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

impl Entity for Tag {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().bind(|t| &t.id, |t| &mut t.id);
        m.field("name").bind(|t| &t.name, |t| &mut t.name);
    }
}

/// Caller-chosen numeric key.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub name: String,
}

impl Entity for Slot {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key().provided_key().bind(|s| &s.id, |s| &mut s.id);
        m.field("name").bind(|s| &s.name, |s| &mut s.name);
    }
}

/// `RUST_LOG=entity_access=debug cargo test` shows the engine's logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn prepare(access: &DataAccess) -> Session {
    init_tracing();
    let session = access.session();
    let none = QueryOptions::new();
    session.create_table::<Author>(&none).await.unwrap();
    session.create_table::<Book>(&none).await.unwrap();
    session.create_table::<Club>(&none).await.unwrap();
    session.create_table::<Ticket>(&none).await.unwrap();
    session.create_table::<Shelf>(&none).await.unwrap();
    session.create_table::<Volume>(&none).await.unwrap();
    session.create_table::<Tag>(&none).await.unwrap();
    session.create_table::<Slot>(&none).await.unwrap();
    session
}

fn author(name: &str, rank: i64) -> Author {
    Author {
        name: name.into(),
        rank,
        ..Author::default()
    }
}

fn none() -> QueryOptions {
    QueryOptions::new()
}

fn by(field: &str, value: impl Into<serde_json::Value>) -> QueryOptions {
    QueryOptions::new().with(QueryOption::condition(Condition::eq(field, value)))
}

pub async fn insert_and_read_back(session: &Session) {
    let ada = session.insert(&author("Ada", 1), &none()).await.unwrap();
    assert!(ada.id > 0);
    assert_eq!(ada.status.as_deref(), Some("active"));
    assert!(!ada.deleted);
    assert!(ada.created_at.is_some());
    assert_eq!(ada.created_at, ada.updated_at);

    let mut poet = author("Bo", 2);
    poet.bio = Some("poet".into());
    let stored = session.insert(&poet, &none()).await.unwrap();
    assert_eq!(stored.bio.as_deref(), Some("poet"));

    let key = EntityKey::from(stored.id);
    let plain: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(plain.bio, None);
    assert_eq!(plain.name, "Bo");
    let full: Author = session
        .get_by_id(&key, &none().with(QueryOption::ReadAllColumn))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(full.bio.as_deref(), Some("poet"));
    assert_eq!(full.created_at, stored.created_at);

    let missing: Option<Author> = session.get_by_id(&EntityKey::from(9_999_i64), &none()).await.unwrap();
    assert!(missing.is_none());

    // field filters do not narrow an insert
    let mut mailed = author("Cal", 3);
    mailed.email = Some("cal@example.org".into());
    let stored = session
        .insert(&mailed, &none().with(QueryOption::omit(["email"])))
        .await
        .unwrap();
    let read: Author = session.get_by_id(&EntityKey::from(stored.id), &none()).await.unwrap().unwrap();
    assert_eq!(read.email.as_deref(), Some("cal@example.org"));
}

pub async fn update_lifecycle(session: &Session) {
    let ada = session.insert(&author("Ada", 1), &none()).await.unwrap();
    let key = EntityKey::from(ada.id);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut changed = ada.clone();
    changed.name = "Ada L".into();
    changed.rank = 9;
    assert_eq!(session.update_by_id(&key, &changed, &none()).await.unwrap(), 1);
    let read: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.name, "Ada L");
    assert_eq!(read.rank, 1, "non-updatable field is dropped silently");
    assert!(read.updated_at > read.created_at);
    assert_eq!(read.created_at, ada.created_at);

    let forced = none().with(QueryOption::ForceReadOnlyWrite);
    session.update_by_id(&key, &changed, &forced).await.unwrap();
    let read: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.rank, 9);

    let n = session
        .update_by_id_with_json::<Author>(&key, &json!({"email": "ada@example.org"}), &none())
        .await
        .unwrap();
    assert_eq!(n, 1);
    let read: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.email.as_deref(), Some("ada@example.org"));
    assert_eq!(read.name, "Ada L");

    let bad = session
        .update_by_id_with_json::<Author>(&key, &json!({"nope": 1}), &none())
        .await;
    assert!(matches!(bad, Err(AccessError::InvalidInput(_))));

    // include narrows the written set
    let mut renamed = read.clone();
    renamed.name = "Countess".into();
    renamed.email = None;
    session
        .update_by_id(&key, &renamed, &none().with(QueryOption::include(["name"])))
        .await
        .unwrap();
    let read: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.name, "Countess");
    assert_eq!(read.email.as_deref(), Some("ada@example.org"));
}

pub async fn soft_delete_and_restore(session: &Session) {
    let a = session.insert(&author("Cy", 1), &none()).await.unwrap();
    let b = session.insert(&author("Di", 2), &none()).await.unwrap();
    let key = EntityKey::from(a.id);
    let visible_before = session.count::<Author>(&none()).await.unwrap();

    assert_eq!(session.delete_by_id::<Author>(&key, &none()).await.unwrap(), 1);
    assert!(session.get_by_id::<Author>(&key, &none()).await.unwrap().is_none());
    let hidden: Author = session
        .get_by_id(&key, &none().with(QueryOption::AccessDeletedItems))
        .await
        .unwrap()
        .unwrap();
    assert!(hidden.deleted);
    assert_eq!(session.count::<Author>(&none()).await.unwrap(), visible_before - 1);
    assert_eq!(session.delete_by_id::<Author>(&key, &none()).await.unwrap(), 0);

    assert_eq!(session.restore_by_id::<Author>(&key, &none()).await.unwrap(), 1);
    let back: Author = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert!(!back.deleted);
    assert_eq!(session.restore_by_id::<Author>(&key, &none()).await.unwrap(), 0);

    let unconditioned = session.delete_where::<Author>(&none()).await;
    assert!(matches!(unconditioned, Err(AccessError::InvalidInput(_))));

    let hard = EntityKey::from(b.id);
    assert_eq!(session.delete_hard_by_id::<Author>(&hard, &none()).await.unwrap(), 1);
    let gone = session
        .get_by_id::<Author>(&hard, &none().with(QueryOption::AccessDeletedItems))
        .await
        .unwrap();
    assert!(gone.is_none());

    assert_eq!(session.delete_where::<Author>(&by("name", "Cy")).await.unwrap(), 1);
    assert_eq!(session.restore_where::<Author>(&by("name", "Cy")).await.unwrap(), 1);
}

pub async fn relationships(session: &Session) {
    let a = session.insert(&author("Eve", 1), &none()).await.unwrap();
    let b = session.insert(&author("Fay", 2), &none()).await.unwrap();
    let book = |title: &str| Book {
        title: title.into(),
        author_id: Some(a.id),
        ..Book::default()
    };
    let b1 = session.insert(&book("One"), &none()).await.unwrap();
    let b2 = session.insert(&book("Two"), &none()).await.unwrap();
    let club = session
        .insert(
            &Club {
                name: "Chess".into(),
                members: vec![a.id, a.id, b.id],
                ..Club::default()
            },
            &none(),
        )
        .await
        .unwrap();
    assert_eq!(club.members, vec![a.id, b.id]);

    let read: Author = session.get_by_id(&EntityKey::from(a.id), &none()).await.unwrap().unwrap();
    assert_eq!(read.books, vec![b1.id, b2.id]);
    assert_eq!(read.clubs, vec![club.id]);

    let club_key = EntityKey::from(club.id);
    let n = session
        .add_link::<Club>(&club_key, "members", &[EntityKey::from(b.id)], &none())
        .await
        .unwrap();
    assert_eq!(n, 1);
    let c: Club = session.get_by_id(&club_key, &none()).await.unwrap().unwrap();
    assert_eq!(c.members, vec![a.id, b.id], "adding an existing key keeps one copy");

    session
        .remove_link::<Club>(&club_key, "members", &[EntityKey::from(b.id)], &none())
        .await
        .unwrap();
    let c: Club = session.get_by_id(&club_key, &none()).await.unwrap().unwrap();
    assert_eq!(c.members, vec![a.id]);
    session
        .add_link::<Club>(&club_key, "members", &[EntityKey::from(b.id)], &none())
        .await
        .unwrap();

    let with_b: Vec<Club> = session.gets(&by("members", b.id)).await.unwrap();
    assert_eq!(with_b.len(), 1);

    // deleting the author clears references to it
    tokio::time::sleep(Duration::from_millis(2)).await;
    session.delete_by_id::<Author>(&EntityKey::from(a.id), &none()).await.unwrap();
    let orphan: Book = session.get_by_id(&EntityKey::from(b1.id), &none()).await.unwrap().unwrap();
    assert_eq!(orphan.author_id, None);
    assert!(orphan.updated_at > b1.updated_at);
    let c: Club = session.get_by_id(&club_key, &none()).await.unwrap().unwrap();
    assert_eq!(c.members, vec![b.id]);

    // Book has no soft-delete field: delete is physical
    let before = session.count::<Book>(&none()).await.unwrap();
    assert_eq!(session.delete_by_id::<Book>(&EntityKey::from(b2.id), &none()).await.unwrap(), 1);
    assert_eq!(session.count::<Book>(&none()).await.unwrap(), before - 1);
}

pub async fn listing(session: &Session) {
    for (name, rank) in [("Kim", 3), ("Lee", 1), ("Max", 2)] {
        session.insert(&author(name, rank), &none()).await.unwrap();
    }
    let ranked: Vec<Author> = session
        .gets(
            &QueryOptions::new()
                .with(QueryOption::condition(Condition::in_list("name", ["Kim", "Lee", "Max"])))
                .with(QueryOption::order_by([OrderBy::desc("rank")])),
        )
        .await
        .unwrap();
    let names: Vec<&str> = ranked.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Kim", "Max", "Lee"]);

    let paged: Vec<Author> = session
        .gets(
            &QueryOptions::new()
                .with(QueryOption::condition(Condition::in_list("name", ["Kim", "Lee", "Max"])))
                .with(QueryOption::order_by([OrderBy::asc("name")]))
                .with(QueryOption::Limit(1))
                .with(QueryOption::Offset(1)),
        )
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].name, "Lee");

    let either = Condition::eq("name", "Kim").or(Condition::gte("rank", 2));
    let n = session
        .count_where::<Author>(
            &QueryOptions::new()
                .with(QueryOption::condition(either))
                .with(QueryOption::condition(Condition::in_list("name", ["Kim", "Lee", "Max"]))),
        )
        .await
        .unwrap();
    assert_eq!(n, 2);

    let first: Author = session
        .get_where(&by("name", "Max").with(QueryOption::omit(["rank"])))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.rank, 0, "omitted fields keep their defaults");

    let n = session
        .update_where(
            &author("Renamed", 0),
            &by("name", "Lee").with(QueryOption::include(["name"])),
        )
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(session.count_where::<Author>(&by("name", "Renamed")).await.unwrap(), 1);
}

pub async fn keys(session: &Session) {
    let explicit = Author {
        id: 500,
        ..author("Key", 1)
    };
    let rejected = session.insert(&explicit, &none()).await;
    assert!(matches!(rejected, Err(AccessError::InvalidInput(_))));
    let stored = session
        .insert(&explicit, &none().with(QueryOption::DirectPrimaryKey))
        .await
        .unwrap();
    assert_eq!(stored.id, 500);

    let ticket = session
        .insert(
            &Ticket {
                label: "first".into(),
                payload: json!({"tags": ["a"]}),
                ..Ticket::default()
            },
            &none(),
        )
        .await
        .unwrap();
    assert!(!ticket.id.is_nil());
    assert_eq!(ticket.payload, json!({"tags": ["a"]}));
    let read: Ticket = session
        .get_by_id(&EntityKey::from(ticket.id), &none())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, ticket);

    let many = session
        .insert_multiple(
            &[
                Book {
                    title: "x".into(),
                    ..Book::default()
                },
                Book {
                    title: "y".into(),
                    ..Book::default()
                },
            ],
            &none(),
        )
        .await
        .unwrap();
    assert_eq!(many.len(), 2);
    assert!(many[1].id > many[0].id);
    assert!(session.clean_all::<Book>(&none()).await.unwrap() >= 2);
    assert_eq!(session.count::<Book>(&none()).await.unwrap(), 0);
}

pub async fn direct_keys_keep_generated_keys_unique(session: &Session) {
    let direct = none().with(QueryOption::DirectPrimaryKey);
    let placed = session
        .insert(&Author { id: 2, ..author("Placed", 1) }, &direct)
        .await
        .unwrap();
    assert_eq!(placed.id, 2);
    let again = session.insert(&Author { id: 2, ..author("Twin", 1) }, &direct).await;
    assert!(again.is_err(), "a second record with key 2 is rejected");

    let first = session.insert(&author("Next", 1), &none()).await.unwrap();
    let second = session.insert(&author("After", 1), &none()).await.unwrap();
    assert!(first.id > 2);
    assert!(second.id > first.id);
    let all: Vec<Author> = session.gets(&none()).await.unwrap();
    let ids: BTreeSet<i64> = all.iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 3);
}

pub async fn key_types(session: &Session) {
    let tag = session
        .insert(
            &Tag {
                name: "rust".into(),
                ..Tag::default()
            },
            &none(),
        )
        .await
        .unwrap();
    assert!(tag.id > 0);
    let read: Tag = session.get_by_id(&EntityKey::from(tag.id), &none()).await.unwrap().unwrap();
    assert_eq!(read, tag);

    let zero = session
        .insert(
            &Slot {
                id: 0,
                name: "ground".into(),
            },
            &none(),
        )
        .await
        .unwrap();
    assert_eq!(zero.id, 0);
    let read: Slot = session.get_by_id(&EntityKey::from(0_i64), &none()).await.unwrap().unwrap();
    assert_eq!(read.name, "ground");
}

pub async fn negated_comparisons_skip_null(session: &Session) {
    let mut with_email = author("Mail", 1);
    with_email.email = Some("a@b".into());
    session.insert(&with_email, &none()).await.unwrap();
    session.insert(&author("NoMail", 2), &none()).await.unwrap();

    let ne = Condition::ne("email", "x@y");
    let n = session
        .count_where::<Author>(&none().with(QueryOption::condition(ne)))
        .await
        .unwrap();
    assert_eq!(n, 1);
    let not_in = Condition::not_in("email", ["x@y"]);
    let n = session
        .count_where::<Author>(&none().with(QueryOption::condition(not_in)))
        .await
        .unwrap();
    assert_eq!(n, 1);
    let n = session
        .count_where::<Author>(&none().with(QueryOption::condition(Condition::is_null("email"))))
        .await
        .unwrap();
    assert_eq!(n, 1);
}

pub async fn update_changes_key_lists_by_difference(session: &Session) {
    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        ids.push(session.insert(&author(name, 1), &none()).await.unwrap().id);
    }
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
    let club = session
        .insert(
            &Club {
                name: "Go".into(),
                members: vec![a, b],
                ..Club::default()
            },
            &none(),
        )
        .await
        .unwrap();
    let key = EntityKey::from(club.id);
    let mut snapshot = club.clone();

    session
        .add_link::<Club>(&key, "members", &[EntityKey::from(c)], &none())
        .await
        .unwrap();
    snapshot.name = "Go club".into();
    snapshot.members = vec![b, a, d, d];
    assert_eq!(session.update_by_id(&key, &snapshot, &none()).await.unwrap(), 1);

    let read: Club = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.name, "Go club");
    assert_eq!(read.members, vec![a, b, d], "kept keys stay in place, new ones are appended");

    // a list-only update still reaches the record
    let n = session
        .update_by_id_with_json::<Club>(&key, &json!({"members": [d]}), &none())
        .await
        .unwrap();
    assert_eq!(n, 1);
    let read: Club = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.members, vec![d]);
}

pub async fn cascading_delete(session: &Session) {
    let shelf = session
        .insert(
            &Shelf {
                label: "Top".into(),
                ..Shelf::default()
            },
            &none(),
        )
        .await
        .unwrap();
    let other = session
        .insert(
            &Shelf {
                label: "Low".into(),
                ..Shelf::default()
            },
            &none(),
        )
        .await
        .unwrap();
    for (title, on) in [("a", shelf.id), ("b", shelf.id), ("c", other.id)] {
        session
            .insert(
                &Volume {
                    title: title.into(),
                    shelf_id: Some(on),
                    ..Volume::default()
                },
                &none(),
            )
            .await
            .unwrap();
    }
    let key = EntityKey::from(shelf.id);
    let read: Shelf = session.get_by_id(&key, &none()).await.unwrap().unwrap();
    assert_eq!(read.volumes.len(), 2);

    // soft delete of the shelf soft-deletes its volumes
    session.delete_by_id::<Shelf>(&key, &none()).await.unwrap();
    assert_eq!(session.count::<Volume>(&none()).await.unwrap(), 1);
    let hidden = session
        .count::<Volume>(&none().with(QueryOption::AccessDeletedItems))
        .await
        .unwrap();
    assert_eq!(hidden, 3);

    // hard delete removes them
    session.delete_hard_by_id::<Shelf>(&key, &none()).await.unwrap();
    let left: Vec<Volume> = session.gets(&none().with(QueryOption::AccessDeletedItems)).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].title, "c");
    assert_eq!(left[0].shelf_id, Some(other.id));
}
