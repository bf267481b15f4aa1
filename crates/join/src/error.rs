use thiserror::Error;

use crate::spec::SpecError;

/// Result alias used throughout the crate.
pub type Result<T, E = JoinError> = std::result::Result<T, E>;

/// Errors raised while resolving join relations, building SQL templates, extracting
/// keys or populating related entities.
///
/// Resolution errors are configuration errors: they are raised on first access and
/// are never cached, so fixing the entity declaration and resolving again succeeds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    /// The join specification of a relation could not be parsed.
    #[error("invalid join spec \"{spec}\" on {entity}.{property}: {reason}")]
    InvalidSpec {
        entity: &'static str,
        property: String,
        spec: String,
        #[source]
        reason: SpecError,
    },

    /// The entity declares no relation with this name.
    #[error("no relation named '{property}' on {entity}")]
    UnknownRelation { entity: &'static str, property: String },

    /// A join spec names a field the entity doesn't have.
    #[error("join spec of {entity}.{property} refers to unknown field {owner}.{field}")]
    UnknownField {
        entity: &'static str,
        property: String,
        owner: &'static str,
        field: String,
    },

    /// The two sides of a column pair have different types.
    #[error(
        "type mismatch in join {entity}.{property}: {left} is {left_type} but {right} is {right_type}"
    )]
    TypeMismatch {
        entity: &'static str,
        property: String,
        left: String,
        left_type: &'static str,
        right: String,
        right_type: &'static str,
    },

    /// The intermediate entity of a two-hop join isn't registered in the owner's module.
    #[error("intermediate entity '{name}' of {entity}.{property} not found in module {module}")]
    UnknownIntermediate {
        entity: &'static str,
        property: String,
        name: String,
        module: &'static str,
    },

    /// A join key component is null or the type's default value.
    #[error("join key {entity}.{field} is null or default")]
    NullKey { entity: &'static str, field: &'static str },

    /// A join key component holds a value that can't be used as a key.
    #[error("unsupported join key value in {entity}.{field}")]
    UnsupportedKeyValue { entity: &'static str, field: &'static str },

    /// A generated statement would be ambiguous even after aliasing.
    #[error("ambiguous column '{column}' between tables {left} and {right}")]
    Ambiguous { column: String, left: String, right: String },

    /// Batch statements need at least one owner.
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    /// The number of owners bound doesn't match the statement's batch size.
    #[error("statement expects {expected} owners, got {found}")]
    BatchMismatch { expected: usize, found: usize },

    /// A template bundle was asked to render for a dialect other than its own.
    #[error("template bundle built for dialect {expected} cannot render for {found}")]
    DialectMismatch { expected: String, found: String },

    /// A key extractor was built without fields.
    #[error("join key of {entity} has no fields")]
    EmptyKey { entity: &'static str },

    /// A requested projection column doesn't exist on the referenced entity.
    #[error("unknown column '{column}' on table {table}")]
    UnknownColumn { table: &'static str, column: String },

    /// The operation isn't defined for this relation.
    #[error("{operation} is not supported for relation {entity}.{property}")]
    Unsupported {
        entity: &'static str,
        property: &'static str,
        operation: &'static str,
    },

    /// The entities passed in aren't the ones the descriptor was resolved for.
    #[error("expected entity {expected}, found {found}")]
    EntityMismatch { expected: &'static str, found: &'static str },

    /// The relation field couldn't accept the grouped entities.
    #[error("relation field {entity}.{property} does not accept {related}")]
    SlotMismatch {
        entity: &'static str,
        property: &'static str,
        related: &'static str,
    },
}
