//! Metadata failures and validation hooks as seen through a session.

mod common;

use common::Author;
use entity_access::{
    metadata_of, AccessError, CheckError, DataAccess, Entity, EntityCheck, EntityMetadata, FieldKind, MetadataCheck,
    MetadataError, ModelBuilder, QueryOption, QueryOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Keyless {
    name: String,
}

impl Entity for Keyless {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("name");
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Clashing {
    id: i64,
    first: String,
    second: String,
}

impl Entity for Clashing {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key();
        m.field("first").column("label");
        m.field("second").column("label");
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TwoClocks {
    id: i64,
    made: String,
    made_again: String,
}

impl Entity for TwoClocks {
    fn describe(m: &mut ModelBuilder<Self>) {
        m.field("id").primary_key();
        m.field("made").created_at();
        m.field("made_again").created_at();
    }
}

#[tokio::test]
async fn broken_metadata_fails_every_verb_with_the_same_error() {
    let session = DataAccess::memory().session();
    let first = session.insert(&Keyless::default(), &QueryOptions::new()).await.unwrap_err();
    let second = session.count::<Keyless>(&QueryOptions::new()).await.unwrap_err();
    let expected = MetadataError::MissingPrimaryKey {
        entity: "Keyless".into(),
    };
    assert!(matches!(first, AccessError::Metadata(ref e) if *e == expected));
    assert!(matches!(second, AccessError::Metadata(ref e) if *e == expected));
}

#[test]
fn storage_names_and_roles_are_unique() {
    assert!(matches!(
        metadata_of::<Clashing>().err(),
        Some(MetadataError::DuplicateStorageName { ref name, .. }) if name == "label"
    ));
    assert!(matches!(
        metadata_of::<TwoClocks>().err(),
        Some(MetadataError::DuplicateRole { .. })
    ));
}

#[test]
fn metadata_is_shared_between_lookups() {
    let a = metadata_of::<Author>().unwrap();
    let b = metadata_of::<Author>().unwrap();
    assert!(std::sync::Arc::ptr_eq(a.metadata(), b.metadata()));
    assert_eq!(a.metadata().table_name, "author");
    let meta = a.metadata();
    assert_eq!(meta.primary_key().name, "id");
    assert_eq!(meta.soft_delete_field().map(|f| f.kind), Some(FieldKind::Bool));
    assert_eq!(meta.created_at_field().map(|f| f.name.as_str()), Some("created_at"));
    assert_eq!(meta.updated_at_field().map(|f| f.kind), Some(FieldKind::Timestamp));
}

#[tokio::test]
async fn declared_constraints_are_enforced_by_the_metadata_check() {
    let session = common::prepare(&DataAccess::memory()).await;
    let checked = QueryOptions::new().with(QueryOption::check(MetadataCheck));
    let long = Author {
        name: "x".repeat(41),
        ..Author::default()
    };
    let err = session.insert(&long, &checked).await.unwrap_err();
    assert!(matches!(err, AccessError::Check { ref source, .. } if source.field == "name"));
    assert_eq!(session.count::<Author>(&QueryOptions::new()).await.unwrap(), 0);

    let ok = session
        .insert(
            &Author {
                name: "Short".into(),
                ..Author::default()
            },
            &checked,
        )
        .await
        .unwrap();
    let err = session
        .update_by_id_with_json::<Author>(&ok.id.into(), &json!({"name": "y".repeat(50)}), &checked)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Check { .. }));
}

#[derive(Debug)]
struct NoShouting;

impl EntityCheck for NoShouting {
    fn check(&self, metadata: &EntityMetadata, values: &Map<String, Value>, fields: &[String]) -> Result<(), CheckError> {
        for field in fields {
            if metadata.field(field).map_or(true, |f| f.kind != FieldKind::Text) {
                continue;
            }
            if let Some(Value::String(s)) = values.get(field) {
                if !s.is_empty() && s.to_uppercase() == *s {
                    return Err(CheckError::new(field.as_str(), "no shouting"));
                }
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn custom_checks_see_only_modified_fields_on_update() {
    let session = common::prepare(&DataAccess::memory()).await;
    let polite = QueryOptions::new().with(QueryOption::check(NoShouting));
    assert!(session
        .insert(
            &Author {
                name: "LOUD".into(),
                ..Author::default()
            },
            &polite,
        )
        .await
        .is_err());

    // stored without the hook, then patched with it
    let loud = session
        .insert(
            &Author {
                name: "LOUD".into(),
                ..Author::default()
            },
            &QueryOptions::new(),
        )
        .await
        .unwrap();
    let n = session
        .update_by_id_with_json::<Author>(&loud.id.into(), &json!({"email": "quiet@example.org"}), &polite)
        .await
        .unwrap();
    assert_eq!(n, 1);
}

/// Remembers the value keys handed to each update check.
#[derive(Debug, Default, Clone)]
struct Seen(Arc<Mutex<Vec<Vec<String>>>>);

impl EntityCheck for Seen {
    fn check(&self, _: &EntityMetadata, values: &Map<String, Value>, _: &[String]) -> Result<(), CheckError> {
        self.0.lock().unwrap().push(values.keys().cloned().collect());
        Ok(())
    }
}

#[tokio::test]
async fn update_checks_receive_only_written_values() {
    let session = common::prepare(&DataAccess::memory()).await;
    let stored = session
        .insert(
            &Author {
                name: "Gil".into(),
                rank: 1,
                ..Author::default()
            },
            &QueryOptions::new(),
        )
        .await
        .unwrap();
    let seen = Seen::default();
    let mut changed = stored.clone();
    changed.name = "Gil B".into();
    changed.rank = 7;
    session
        .update_by_id(
            &stored.id.into(),
            &changed,
            &QueryOptions::new().with(QueryOption::check(seen.clone())),
        )
        .await
        .unwrap();
    let calls = seen.0.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&"name".to_string()));
    assert!(!calls[0].contains(&"rank".to_string()), "non-updatable field is not handed to the check");
    assert!(!calls[0].contains(&"id".to_string()));

    session
        .update_by_id(
            &stored.id.into(),
            &changed,
            &QueryOptions::new()
                .with(QueryOption::check(seen.clone()))
                .with(QueryOption::include(["email"])),
        )
        .await
        .unwrap();
    let calls = seen.0.lock().unwrap().clone();
    assert_eq!(calls[1], vec!["email".to_string()]);
}

#[tokio::test]
async fn bad_options_are_rejected_before_touching_storage() {
    let session = common::prepare(&DataAccess::memory()).await;
    let injected = QueryOptions::new().with(QueryOption::rename("name", "name; DROP TABLE author"));
    let err = session.gets::<Author>(&injected).await.unwrap_err();
    assert!(matches!(err, AccessError::OptionConflict(_)));

    let err = session.update_where(&Author::default(), &QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, AccessError::InvalidInput(_)));
}
