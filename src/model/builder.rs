//! Declarative entity description: the `Entity` trait and its field builder.

use crate::model::types::{Constraints, EntityRef, FieldKind, KeyStrategy, OnDelete, Role};
use crate::model::value::FieldValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A persistable type. `describe` declares table, fields, roles and relationships.
///
/// ```ignore
/// impl Entity for User {
///     fn describe(m: &mut ModelBuilder<Self>) {
///         m.table("user");
///         m.field("id").primary_key().bind(|u| &u.id, |u| &mut u.id);
///         m.field("name").max_length(64).bind(|u| &u.name, |u| &mut u.name);
///         m.field("deleted").soft_delete();
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn describe(model: &mut ModelBuilder<Self>);
}

pub(crate) type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<(), String> + Send + Sync>;

/// Typed getter/setter pair captured by `FieldDecl::bind`.
pub(crate) struct TypedBinding<T> {
    pub kind: FieldKind,
    pub nullable: bool,
    pub get: Getter<T>,
    pub set: Setter<T>,
}

#[derive(Debug, Clone)]
pub(crate) enum RelationDecl {
    ToOne(EntityRef),
    ToManyOwned(EntityRef),
    Mirrored {
        source: EntityRef,
        source_field: String,
    },
}

pub struct ModelBuilder<T> {
    pub(crate) table: Option<String>,
    pub(crate) fields: Vec<FieldDecl<T>>,
}

impl<T: Entity> ModelBuilder<T> {
    pub(crate) fn new() -> Self {
        ModelBuilder {
            table: None,
            fields: Vec::new(),
        }
    }

    /// Storage name of the table / collection. Defaults to the snake_case type name.
    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.table = Some(name.into());
        self
    }

    /// Declares a field by its logical (serde) name.
    pub fn field(&mut self, name: &str) -> &mut FieldDecl<T> {
        let idx = self.fields.len();
        self.fields.push(FieldDecl::new(name));
        &mut self.fields[idx]
    }
}

pub struct FieldDecl<T> {
    pub(crate) name: String,
    pub(crate) column: Option<String>,
    pub(crate) kind: Option<FieldKind>,
    pub(crate) nullable: Option<bool>,
    pub(crate) default_value: Option<String>,
    pub(crate) creatable: bool,
    pub(crate) updatable: bool,
    pub(crate) read_by_default: bool,
    pub(crate) transient: bool,
    pub(crate) role: Role,
    pub(crate) roles_declared: usize,
    pub(crate) key_strategy: Option<KeyStrategy>,
    pub(crate) constraints: Constraints,
    pub(crate) comment: Option<String>,
    pub(crate) relation: Option<RelationDecl>,
    pub(crate) on_delete: OnDelete,
    pub(crate) binding: Option<TypedBinding<T>>,
}

impl<T: Entity> FieldDecl<T> {
    fn new(name: &str) -> Self {
        FieldDecl {
            name: name.to_string(),
            column: None,
            kind: None,
            nullable: None,
            default_value: None,
            creatable: true,
            updatable: true,
            read_by_default: true,
            transient: false,
            role: Role::None,
            roles_declared: 0,
            key_strategy: None,
            constraints: Constraints::default(),
            comment: None,
            relation: None,
            on_delete: OnDelete::default(),
            binding: None,
        }
    }

    fn with_role(&mut self, role: Role) -> &mut Self {
        self.role = role;
        self.roles_declared += 1;
        self
    }

    /// Explicit storage (column / document key) name.
    pub fn column(&mut self, name: impl Into<String>) -> &mut Self {
        self.column = Some(name.into());
        self
    }

    /// Declared kind; wins over the kind implied by the binding.
    pub fn kind(&mut self, kind: FieldKind) -> &mut Self {
        self.kind = Some(kind);
        self
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = Some(true);
        self
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = Some(false);
        self
    }

    /// Storage-level default expression, e.g. `"'draft'"` or `"0"`.
    pub fn default_value(&mut self, expr: impl Into<String>) -> &mut Self {
        self.default_value = Some(expr.into());
        self
    }

    pub fn read_only(&mut self) -> &mut Self {
        self.creatable = false;
        self.updatable = false;
        self
    }

    pub fn no_create(&mut self) -> &mut Self {
        self.creatable = false;
        self
    }

    pub fn no_update(&mut self) -> &mut Self {
        self.updatable = false;
        self
    }

    /// Left out of projections unless all columns are requested.
    pub fn not_read(&mut self) -> &mut Self {
        self.read_by_default = false;
        self
    }

    /// Exists on the type only; never stored.
    pub fn transient(&mut self) -> &mut Self {
        self.transient = true;
        self
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.comment = Some(text.into());
        self
    }

    pub fn max_length(&mut self, n: u32) -> &mut Self {
        self.constraints.max_length = Some(n);
        self
    }

    pub fn min(&mut self, v: f64) -> &mut Self {
        self.constraints.min = Some(v);
        self
    }

    pub fn max(&mut self, v: f64) -> &mut Self {
        self.constraints.max = Some(v);
        self
    }

    pub fn pattern(&mut self, re: impl Into<String>) -> &mut Self {
        self.constraints.pattern = Some(re.into());
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.constraints.unique = true;
        self
    }

    pub fn primary_key(&mut self) -> &mut Self {
        self.with_role(Role::PrimaryKey)
    }

    /// Primary key generated by the backend (identity column / counter document).
    pub fn auto_increment(&mut self) -> &mut Self {
        self.key_strategy = Some(KeyStrategy::AutoIncrement);
        self
    }

    /// Primary key generated by the engine as a v4 UUID.
    pub fn uuid_key(&mut self) -> &mut Self {
        self.key_strategy = Some(KeyStrategy::Uuid);
        self
    }

    /// Primary key always supplied by the caller.
    pub fn provided_key(&mut self) -> &mut Self {
        self.key_strategy = Some(KeyStrategy::Provided);
        self
    }

    pub fn soft_delete(&mut self) -> &mut Self {
        self.with_role(Role::SoftDelete)
    }

    pub fn created_at(&mut self) -> &mut Self {
        self.with_role(Role::CreatedAt)
    }

    pub fn updated_at(&mut self) -> &mut Self {
        self.with_role(Role::UpdatedAt)
    }

    /// Scalar foreign key to `U`.
    pub fn to_one<U: Entity>(&mut self) -> &mut Self {
        self.relation = Some(RelationDecl::ToOne(EntityRef::of::<U>()));
        self
    }

    /// Array of `U` keys owned by this entity.
    pub fn to_many<U: Entity>(&mut self) -> &mut Self {
        self.relation = Some(RelationDecl::ToManyOwned(EntityRef::of::<U>()));
        self
    }

    /// Keys of every `U` whose `source_field` references this entity. Never stored.
    pub fn mirrored<U: Entity>(&mut self, source_field: &str) -> &mut Self {
        self.relation = Some(RelationDecl::Mirrored {
            source: EntityRef::of::<U>(),
            source_field: source_field.to_string(),
        });
        self
    }

    /// Policy applied to the referencing side when this entity is deleted (mirrored fields only).
    pub fn on_delete(&mut self, policy: OnDelete) -> &mut Self {
        self.on_delete = policy;
        self
    }

    /// Direct typed accessor. Without it the field is read and written through serde.
    pub fn bind<V: FieldValue + 'static>(&mut self, get: fn(&T) -> &V, get_mut: fn(&mut T) -> &mut V) -> &mut Self {
        self.binding = Some(TypedBinding {
            kind: V::KIND,
            nullable: V::NULLABLE,
            get: Box::new(move |t| get(t).to_value()),
            set: Box::new(move |t, v| {
                *get_mut(t) = V::from_value(v)?;
                Ok(())
            }),
        });
        self
    }
}
