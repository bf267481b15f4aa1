use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::Value;

/// Declares an ORM entity with automatic `Entity` trait implementation.
///
/// Relations are declared as `field: Type = "join spec"` and are added to the struct
/// after the persisted fields. Relation fields are resolved by the join engine rather
/// than persisted, so they are not part of the entity's projection.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "employees",
///     relations = [
///         projects: Vec<Project> = "id = EmployeeProject.employee_id, EmployeeProject.project_id = id",
///         department: Option<Department> = "department_id = id",
///     ],
///     #[derive(Debug, Clone, Default)]
///     pub struct Employee {
///         pub id: i64,
///         pub name: String,
///         pub department_id: Option<i64>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Full form: relations + struct (single code-generation arm)
    (
        table = $table:literal,
        relations = [$( $rel_name:ident : $rel_type:ty = $rel_spec:literal ),* $(,)?],
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type,
            )*
            $(
                pub $rel_name : $rel_type,
            )*
        }

        impl $crate::Record for $struct_name {
            fn entity_name(&self) -> &'static str {
                stringify!($struct_name)
            }

            fn field_value(&self, field: &str) -> Option<$crate::__private::Value> {
                match field {
                    $(
                        stringify!($field_name) => Some(self.$field_name.clone().into()),
                    )*
                    _ => None,
                }
            }
        }

        impl $crate::Entity for $struct_name {
            const TABLE: &'static str = $table;
            const NAME: &'static str = stringify!($struct_name);
            const MODULE: &'static str = module_path!();

            fn fields() -> &'static [$crate::FieldDef] {
                const FIELDS: &[$crate::FieldDef] = &[
                    $(
                        $crate::FieldDef {
                            name: stringify!($field_name),
                            column_type: <$field_type as $crate::ColumnValue>::COLUMN_TYPE,
                            nullable: <$field_type as $crate::ColumnValue>::NULLABLE,
                        },
                    )*
                ];
                FIELDS
            }

            fn relations() -> Vec<$crate::RelationDef> {
                vec![
                    $(
                        $crate::RelationDef {
                            property: stringify!($rel_name),
                            spec: $rel_spec,
                            target: $crate::EntityRef::of::<
                                <$rel_type as $crate::RelationSlot>::Target,
                            >(),
                            cardinality: <$rel_type as $crate::RelationSlot>::CARDINALITY,
                        },
                    )*
                ]
            }

            #[allow(unused_variables)]
            fn assign_relation(
                &mut self, property: &str, related: &mut dyn ::std::any::Any,
            ) -> bool {
                match property {
                    $(
                        stringify!($rel_name) => {
                            type Target = <$rel_type as $crate::RelationSlot>::Target;
                            let Some(items) = related.downcast_mut::<Vec<Target>>() else {
                                return false;
                            };
                            <$rel_type as $crate::RelationSlot>::fill(
                                &mut self.$rel_name,
                                ::std::mem::take(items),
                            );
                            true
                        }
                    )*
                    _ => false,
                }
            }
        }
    };

    // Bare table → forward with empty relations
    (
        table = $table:literal,
        $($rest:tt)*
    ) => {
        $crate::entity! {
            table = $table,
            relations = [],
            $($rest)*
        }
    };
}

/// Object-safe view of an entity instance used for key extraction.
pub trait Record {
    /// Simple type name of the entity.
    fn entity_name(&self) -> &'static str;

    /// Current value of a persisted field, or `None` if the entity has no such field.
    fn field_value(&self, field: &str) -> Option<Value>;
}

/// Trait for database entities with metadata for join resolution.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: Record + Sized + Send + Sync + 'static {
    /// The database table name for this entity.
    const TABLE: &'static str;

    /// Simple type name, used to match qualifiers in join specs.
    const NAME: &'static str;

    /// Module the entity is declared in. Intermediate entities of two-hop joins are
    /// looked up in the owner's module.
    const MODULE: &'static str;

    /// Persisted fields, in declaration order.
    fn fields() -> &'static [FieldDef];

    /// Relations declared on this entity.
    #[must_use]
    fn relations() -> Vec<RelationDef> {
        Vec::new()
    }

    /// Assign grouped related entities to the relation field `property`.
    ///
    /// `related` must be a `Vec<R>` where `R` is the relation's target entity. Returns
    /// `false` when the entity has no such relation or `related` has the wrong type.
    fn assign_relation(&mut self, property: &str, related: &mut dyn Any) -> bool;
}

/// Static description of a persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field (and column) name.
    pub name: &'static str,
    /// Normalized column type. `Option<T>` has the same column type as `T`.
    pub column_type: ColumnType,
    /// Whether the field is an `Option`.
    pub nullable: bool,
}

impl FieldDef {
    /// The value written when the column is nulled out: `NULL` for nullable fields, the
    /// type's zero value otherwise.
    #[must_use]
    pub fn default_value(&self) -> Value {
        if self.nullable { self.column_type.null() } else { self.column_type.zero() }
    }
}

/// Normalized column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int,
    BigInt,
    Unsigned,
    BigUnsigned,
    Float,
    Double,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl ColumnType {
    /// Typed SQL `NULL` for this column type.
    #[must_use]
    pub const fn null(self) -> Value {
        match self {
            Self::Bool => Value::Bool(None),
            Self::Int => Value::Int(None),
            Self::BigInt => Value::BigInt(None),
            Self::Unsigned => Value::Unsigned(None),
            Self::BigUnsigned => Value::BigUnsigned(None),
            Self::Float => Value::Float(None),
            Self::Double => Value::Double(None),
            Self::String => Value::String(None),
            Self::Bytes => Value::Bytes(None),
            Self::Date => Value::ChronoDate(None),
            Self::Time => Value::ChronoTime(None),
            Self::DateTime => Value::ChronoDateTime(None),
            Self::Timestamp => Value::ChronoDateTimeUtc(None),
        }
    }

    /// Zero value for this column type. Types without a meaningful zero use `NULL`.
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => false.into(),
            Self::Int => 0_i32.into(),
            Self::BigInt => 0_i64.into(),
            Self::Unsigned => 0_u32.into(),
            Self::BigUnsigned => 0_u64.into(),
            Self::Float => 0_f32.into(),
            Self::Double => 0_f64.into(),
            Self::String => String::new().into(),
            Self::Bytes => Vec::<u8>::new().into(),
            Self::Date | Self::Time | Self::DateTime | Self::Timestamp => self.null(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ColumnType {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Unsigned => "unsigned",
            Self::BigUnsigned => "bigunsigned",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Rust types usable as entity fields.
pub trait ColumnValue: Clone + Into<Value> {
    /// Normalized column type.
    const COLUMN_TYPE: ColumnType;
    /// Whether the type admits `NULL`.
    const NULLABLE: bool = false;
}

macro_rules! column_value {
    ($($ty:ty => $column_type:ident),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const COLUMN_TYPE: ColumnType = ColumnType::$column_type;
            }
        )*
    };
}

column_value! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    u32 => Unsigned,
    u64 => BigUnsigned,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => Timestamp,
}

impl<T> ColumnValue for Option<T>
where
    T: ColumnValue,
    Self: Into<Value>,
{
    const COLUMN_TYPE: ColumnType = T::COLUMN_TYPE;
    const NULLABLE: bool = true;
}

/// Whether a relation field holds one related entity or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Only the first matching entity is assigned.
    Single,
    /// All matching entities are assigned, in order.
    Collection,
}

/// Types usable as relation fields.
pub trait RelationSlot {
    /// The related entity type.
    type Target: Entity;
    /// Single or collection.
    const CARDINALITY: Cardinality;

    /// Replace the slot's content with `items` (never empty).
    fn fill(&mut self, items: Vec<Self::Target>);
}

impl<R: Entity> RelationSlot for Vec<R> {
    type Target = R;

    const CARDINALITY: Cardinality = Cardinality::Collection;

    fn fill(&mut self, items: Vec<R>) {
        *self = items;
    }
}

impl<R: Entity> RelationSlot for VecDeque<R> {
    type Target = R;

    const CARDINALITY: Cardinality = Cardinality::Collection;

    fn fill(&mut self, items: Vec<R>) {
        *self = items.into();
    }
}

impl<R: Entity> RelationSlot for Option<R> {
    type Target = R;

    const CARDINALITY: Cardinality = Cardinality::Single;

    fn fill(&mut self, items: Vec<R>) {
        *self = items.into_iter().next();
    }
}

/// Type-erased handle to an entity type's static metadata.
#[derive(Clone, Copy)]
pub struct EntityRef {
    /// `TypeId` of the entity.
    pub type_id: TypeId,
    /// Simple type name.
    pub name: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Declaring module.
    pub module: &'static str,
    fields: fn() -> &'static [FieldDef],
}

impl EntityRef {
    /// Metadata handle for `E`.
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: E::NAME,
            table: E::TABLE,
            module: E::MODULE,
            fields: E::fields,
        }
    }

    /// Persisted fields.
    #[must_use]
    pub fn fields(&self) -> &'static [FieldDef] {
        (self.fields)()
    }

    /// Field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields().iter().find(|field| field.name == name)
    }

    /// Whether this handle describes `E`.
    #[must_use]
    pub fn is<E: Entity>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityRef {}

/// A relation declared on an entity.
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Relation field name.
    pub property: &'static str,
    /// Join specification.
    pub spec: &'static str,
    /// Referenced entity.
    pub target: EntityRef,
    /// Single or collection.
    pub cardinality: Cardinality,
}
