//! Process-wide metadata cache keyed by type. Entries are built once, never replaced.

use crate::accessor::Accessor;
use crate::error::{AccessError, MetadataError};
use crate::model::builder::{Entity, ModelBuilder};
use crate::model::types::EntityMetadata;
use crate::model::validator;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Metadata of `T` together with the accessors that read and write its fields.
pub struct EntityModel<T> {
    metadata: Arc<EntityMetadata>,
    /// Parallel to `metadata.fields`.
    accessors: Vec<Accessor<T>>,
}

impl<T: Entity> EntityModel<T> {
    pub(crate) fn new(metadata: Arc<EntityMetadata>, accessors: Vec<Accessor<T>>) -> Self {
        EntityModel { metadata, accessors }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn accessor(&self, field: usize) -> &Accessor<T> {
        &self.accessors[field]
    }

    pub fn read(&self, instance: &T, field: usize) -> Result<Value, AccessError> {
        self.accessors[field].get(instance).map_err(|message| self.marshal(field, message))
    }

    pub fn write(&self, instance: &mut T, field: usize, value: Value) -> Result<(), AccessError> {
        self.accessors[field]
            .set(instance, value)
            .map_err(|message| self.marshal(field, message))
    }

    /// Logical name -> value for the given fields.
    pub fn values(&self, instance: &T, fields: &[usize]) -> Result<Map<String, Value>, AccessError> {
        let mut out = Map::new();
        for &idx in fields {
            out.insert(self.metadata.fields[idx].name.clone(), self.read(instance, idx)?);
        }
        Ok(out)
    }

    fn marshal(&self, field: usize, message: String) -> AccessError {
        AccessError::Marshal {
            entity: self.metadata.type_name.to_string(),
            field: self.metadata.fields[field].name.clone(),
            message,
        }
    }
}

type Built<T> = Result<Arc<EntityModel<T>>, MetadataError>;
type Slot = Arc<dyn Any + Send + Sync>;

static REGISTRY: OnceLock<RwLock<HashMap<TypeId, Slot>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<TypeId, Slot>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn build<T: Entity>() -> Built<T> {
    let mut builder = ModelBuilder::<T>::new();
    T::describe(&mut builder);
    validator::resolve(builder).map(Arc::new)
}

/// Metadata and accessors for `T`, built on first use. A failed build is cached like a successful one.
pub fn metadata_of<T: Entity>() -> Result<Arc<EntityModel<T>>, MetadataError> {
    let id = TypeId::of::<T>();
    let cached = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned();
    let slot = match cached {
        Some(slot) => slot,
        None => {
            // Built outside the lock; concurrent builders race and the first insert wins.
            let built: Slot = Arc::new(build::<T>());
            let mut map = registry().write().unwrap_or_else(PoisonError::into_inner);
            map.entry(id).or_insert(built).clone()
        }
    };
    match slot.downcast_ref::<Built<T>>() {
        Some(built) => built.clone(),
        None => build::<T>(),
    }
}

/// Type-erased metadata lookup used by relationship references.
pub(crate) fn erased_metadata<T: Entity>() -> Result<Arc<EntityMetadata>, MetadataError> {
    metadata_of::<T>().map(|m| Arc::clone(m.metadata()))
}
