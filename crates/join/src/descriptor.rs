use std::sync::Arc;

use moka::sync::Cache;

use crate::dialect::Dialect;
use crate::entity::{Cardinality, Entity, EntityRef, FieldDef, Record, RelationDef};
use crate::error::{JoinError, Result};
use crate::key::{JoinKey, KeyExtractor};
use crate::options::JoinOptions;
use crate::schema::Schema;
use crate::spec::{self, ParsedSpec, Topology};
use crate::template::{Delete, Statement, TemplateBundle};

/// The intermediate entity of a two-hop relation and its two bridging fields.
#[derive(Debug, Clone, Copy)]
pub struct Bridge {
    /// Intermediate entity.
    pub entity: EntityRef,
    /// Field matched against the owner key.
    pub near: &'static FieldDef,
    /// Field matched against the referenced key.
    pub far: &'static FieldDef,
}

/// Everything template construction needs to know about a relation.
#[derive(Debug, Clone)]
pub(crate) struct Shape {
    pub(crate) owner: EntityRef,
    pub(crate) property: &'static str,
    pub(crate) referenced: EntityRef,
    pub(crate) source: Vec<&'static FieldDef>,
    pub(crate) target: Vec<&'static FieldDef>,
    pub(crate) bridge: Option<Bridge>,
    pub(crate) owner_key: Arc<KeyExtractor>,
    pub(crate) cascade_in_db: bool,
}

impl Shape {
    pub(crate) fn owner_key_alias(&self) -> Option<String> {
        self.bridge.as_ref().map(|bridge| format!("{}_{}", bridge.entity.table, bridge.near.name))
    }
}

/// Resolved, validated description of one relation of an owner entity.
///
/// Descriptors are immutable. Template bundles are built lazily, once per dialect id.
pub struct JoinDescriptor {
    table: String,
    spec: &'static str,
    topology: Topology,
    cardinality: Cardinality,
    options: JoinOptions,
    shape: Shape,
    target_key: KeyExtractor,
    bundles: Cache<String, Arc<TemplateBundle>>,
}

impl std::fmt::Debug for JoinDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinDescriptor")
            .field("owner", &self.shape.owner.name)
            .field("table", &self.table)
            .field("property", &self.shape.property)
            .field("spec", &self.spec)
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl JoinDescriptor {
    /// Parse and validate `relation` of `E` stored in `table`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the entity, property and offending value
    /// when the join spec is malformed, names unknown fields, joins fields of different
    /// types or refers to an intermediate entity missing from `schema`.
    pub(crate) fn resolve<E: Entity>(
        schema: &Schema, table: &str, relation: &RelationDef, options: JoinOptions,
    ) -> Result<Self> {
        let owner = EntityRef::of::<E>();
        let referenced = relation.target;
        let parsed = spec::parse(relation.spec, owner.name, referenced.name).map_err(|reason| {
            JoinError::InvalidSpec {
                entity: owner.name,
                property: relation.property.to_string(),
                spec: relation.spec.to_string(),
                reason,
            }
        })?;

        let validator = Validator { owner, relation };
        let (source, target, bridge) = match parsed.topology {
            Topology::Direct => {
                let mut source = Vec::with_capacity(parsed.pairs.len());
                let mut target = Vec::with_capacity(parsed.pairs.len());
                for pair in &parsed.pairs {
                    let left = validator.field(owner, &pair.source.field)?;
                    let right = validator.field(referenced, &pair.target.field)?;
                    validator.same_type((owner, left), (referenced, right))?;
                    source.push(left);
                    target.push(right);
                }
                (source, target, None)
            }
            Topology::TwoHop => {
                let (left, right, bridge) = validator.bridge(schema, &parsed)?;
                (vec![left], vec![right], Some(bridge))
            }
        };

        let owner_key = KeyExtractor::new(
            owner.name,
            source.iter().map(|field| field.name).collect(),
            !options.allow_null_join_key,
        );
        let target_key = KeyExtractor::new(
            referenced.name,
            target.iter().map(|field| field.name).collect(),
            false,
        );

        tracing::debug!(
            entity = owner.name,
            table,
            property = relation.property,
            spec = relation.spec,
            topology = ?parsed.topology,
            "resolved join descriptor"
        );

        Ok(Self {
            table: table.to_string(),
            spec: relation.spec,
            topology: parsed.topology,
            cardinality: relation.cardinality,
            options,
            shape: Shape {
                owner,
                property: relation.property,
                referenced,
                source,
                target,
                bridge,
                owner_key: Arc::new(owner_key),
                cascade_in_db: options.cascade_delete_in_db,
            },
            target_key,
            bundles: Cache::builder().build(),
        })
    }

    /// Owner entity.
    #[must_use]
    pub const fn owner(&self) -> EntityRef {
        self.shape.owner
    }

    /// Table the owner was resolved for.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Relation field name.
    #[must_use]
    pub const fn property(&self) -> &'static str {
        self.shape.property
    }

    /// Raw join spec.
    #[must_use]
    pub const fn spec(&self) -> &'static str {
        self.spec
    }

    /// Direct or two-hop.
    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Whether the relation goes through an intermediate entity.
    #[must_use]
    pub fn is_two_hop(&self) -> bool {
        self.topology == Topology::TwoHop
    }

    /// Whether the relation field holds one entity or a collection.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Referenced entity.
    #[must_use]
    pub const fn referenced(&self) -> EntityRef {
        self.shape.referenced
    }

    /// Owner-side join fields, in join spec order.
    #[must_use]
    pub fn source_fields(&self) -> &[&'static FieldDef] {
        &self.shape.source
    }

    /// Referenced-side join fields, in join spec order.
    #[must_use]
    pub fn target_fields(&self) -> &[&'static FieldDef] {
        &self.shape.target
    }

    /// Intermediate entity of a two-hop relation.
    #[must_use]
    pub const fn bridge(&self) -> Option<&Bridge> {
        self.shape.bridge.as_ref()
    }

    /// Options captured when the descriptor was resolved.
    #[must_use]
    pub const fn options(&self) -> JoinOptions {
        self.options
    }

    /// Output column carrying the owner key in two-hop batch selects. Rows of those
    /// selects are grouped by this column rather than by a referenced field.
    #[must_use]
    pub fn owner_key_alias(&self) -> Option<String> {
        self.shape.owner_key_alias()
    }

    /// Join key of an owner.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::NullKey`] for null or default components unless
    /// [`JoinOptions::allow_null_join_key`] is set.
    pub fn owner_key(&self, owner: &dyn Record) -> Result<JoinKey> {
        self.shape.owner_key.extract(owner)
    }

    /// Join key of a referenced entity, used to group direct relations.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::UnsupportedKeyValue`] for components that can't be keyed.
    pub fn target_key(&self, related: &dyn Record) -> Result<JoinKey> {
        self.target_key.extract(related)
    }

    /// Template bundle for `dialect`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Ambiguous`] if two-hop statements can't be disambiguated.
    pub fn bundle(&self, dialect: &dyn Dialect) -> Result<Arc<TemplateBundle>> {
        self.bundles
            .try_get_with(dialect.id().to_string(), || {
                TemplateBundle::build(&self.shape, dialect).map(Arc::new)
            })
            .map_err(|e| (*e).clone())
    }

    /// See [`TemplateBundle::select`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle can't be built or a column is unknown.
    pub fn select(&self, dialect: &dyn Dialect, columns: &[&str]) -> Result<Statement> {
        self.bundle(dialect)?.select(dialect, columns)
    }

    /// See [`TemplateBundle::batch_select`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle can't be built, the batch is empty or a column is
    /// unknown.
    pub fn batch_select(
        &self, dialect: &dyn Dialect, columns: &[&str], batch: usize,
    ) -> Result<Statement> {
        self.bundle(dialect)?.batch_select(dialect, columns, batch)
    }

    /// See [`TemplateBundle::set_null`].
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Unsupported`] for two-hop relations.
    pub fn set_null(&self, dialect: &dyn Dialect) -> Result<Statement> {
        self.bundle(dialect)?.set_null()
    }

    /// See [`TemplateBundle::delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle can't be built.
    pub fn delete(&self, dialect: &dyn Dialect) -> Result<Delete> {
        Ok(self.bundle(dialect)?.delete())
    }

    /// See [`TemplateBundle::batch_delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle can't be built or the batch is empty.
    pub fn batch_delete(&self, dialect: &dyn Dialect, batch: usize) -> Result<Delete> {
        self.bundle(dialect)?.batch_delete(dialect, batch)
    }
}

struct Validator<'a> {
    owner: EntityRef,
    relation: &'a RelationDef,
}

impl Validator<'_> {
    fn field(&self, entity: EntityRef, name: &str) -> Result<&'static FieldDef> {
        entity.field(name).ok_or_else(|| JoinError::UnknownField {
            entity: self.owner.name,
            property: self.relation.property.to_string(),
            owner: entity.name,
            field: name.to_string(),
        })
    }

    // `Option<T>` fields carry the column type of `T`, so nullability is ignored here.
    fn same_type(
        &self, (left_entity, left): (EntityRef, &FieldDef),
        (right_entity, right): (EntityRef, &FieldDef),
    ) -> Result<()> {
        if left.column_type == right.column_type {
            return Ok(());
        }
        Err(JoinError::TypeMismatch {
            entity: self.owner.name,
            property: self.relation.property.to_string(),
            left: format!("{}.{}", left_entity.name, left.name),
            left_type: left.column_type.as_str(),
            right: format!("{}.{}", right_entity.name, right.name),
            right_type: right.column_type.as_str(),
        })
    }

    fn bridge(
        &self, schema: &Schema, parsed: &ParsedSpec,
    ) -> Result<(&'static FieldDef, &'static FieldDef, Bridge)> {
        let name = parsed.intermediate.as_deref().unwrap_or_default();
        let intermediate = schema.find(self.owner.module, name).ok_or_else(|| {
            JoinError::UnknownIntermediate {
                entity: self.owner.name,
                property: self.relation.property.to_string(),
                name: name.to_string(),
                module: self.owner.module,
            }
        })?;
        let referenced = self.relation.target;
        let (first, second) = (&parsed.pairs[0], &parsed.pairs[1]);

        let source = self.field(self.owner, &first.source.field)?;
        let near = self.field(intermediate, &first.target.field)?;
        let far = self.field(intermediate, &second.source.field)?;
        let target = self.field(referenced, &second.target.field)?;
        self.same_type((self.owner, source), (intermediate, near))?;
        self.same_type((intermediate, far), (referenced, target))?;

        Ok((
            source,
            target,
            Bridge {
                entity: intermediate,
                near,
                far,
            },
        ))
    }
}
