//! Per-dialect SQL templates for one join descriptor.
//!
//! A [`TemplateBundle`] is built once per dialect id. Fixed-shape statements (set-null
//! and single deletes) are rendered up front; projection- and batch-size-dependent
//! statements are rendered on first use and memoized.

use std::sync::Arc;

use moka::sync::Cache;
use sea_query::{Alias, JoinType, Value};

use crate::descriptor::{Bridge, Shape};
use crate::dialect::{Dialect, TableName, column_expr};
use crate::entity::{FieldDef, Record};
use crate::error::{JoinError, Result};
use crate::filter::{Column, Filter};
use crate::key::KeyExtractor;

const RENDER_CACHE_CAPACITY: u64 = 256;

/// SQL text with positional parameters, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Produces the ordered parameters of a [`Statement`] from owner entities.
///
/// Parameters are the fixed prefix (column defaults for set-null statements) followed
/// by the owner key values of each owner in turn.
#[derive(Debug, Clone)]
pub struct Binder {
    key: Arc<KeyExtractor>,
    prefix: Arc<[Value]>,
    batch: usize,
}

impl Binder {
    fn new(key: &Arc<KeyExtractor>, prefix: Arc<[Value]>, batch: usize) -> Self {
        Self {
            key: Arc::clone(key),
            prefix,
            batch,
        }
    }

    /// Number of owners the statement is built for.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch
    }

    /// Number of placeholders the statement contains.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.prefix.len() + self.batch * self.key.fields().len()
    }

    /// Parameters for a single-owner statement.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::BatchMismatch`] for batch statements of more than one owner,
    /// or a key extraction error for the owner.
    pub fn bind(&self, owner: &dyn Record) -> Result<Vec<Value>> {
        if self.batch != 1 {
            return Err(JoinError::BatchMismatch {
                expected: self.batch,
                found: 1,
            });
        }
        let mut params = self.prefix.to_vec();
        params.extend(self.key.values(owner)?);
        Ok(params)
    }

    /// Parameters for a batch statement, owners in order.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::BatchMismatch`] if `owners.len()` isn't the batch size, or
    /// the first key extraction error.
    pub fn bind_all<R: Record>(&self, owners: &[R]) -> Result<Vec<Value>> {
        if owners.len() != self.batch {
            return Err(JoinError::BatchMismatch {
                expected: self.batch,
                found: owners.len(),
            });
        }
        let mut params = Vec::with_capacity(self.param_count());
        params.extend_from_slice(&self.prefix);
        for owner in owners {
            params.extend(self.key.values(owner)?);
        }
        Ok(params)
    }
}

/// A rendered statement paired with its binder.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: Arc<str>,
    pub binder: Binder,
}

impl Statement {
    /// Bind a single owner.
    ///
    /// # Errors
    ///
    /// See [`Binder::bind`].
    pub fn query(&self, owner: &dyn Record) -> Result<Query> {
        Ok(Query {
            sql: self.sql.to_string(),
            params: self.binder.bind(owner)?,
        })
    }

    /// Bind a batch of owners.
    ///
    /// # Errors
    ///
    /// See [`Binder::bind_all`].
    pub fn batch_query<R: Record>(&self, owners: &[R]) -> Result<Query> {
        Ok(Query {
            sql: self.sql.to_string(),
            params: self.binder.bind_all(owners)?,
        })
    }
}

/// Delete statements for a relation.
///
/// For two-hop relations the referenced-table delete selects its rows through the
/// intermediate table, so `main` must run before `intermediate`.
#[derive(Debug, Clone)]
pub struct Delete {
    pub main: Statement,
    pub intermediate: Option<Statement>,
    cascade_in_db: bool,
}

impl Delete {
    /// Statements to execute, in order. The intermediate delete is left out when the
    /// database cascades it.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        let cascade = self.cascade_in_db;
        std::iter::once(&self.main).chain(self.intermediate.iter().filter(move |_| !cascade))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RenderKey {
    Select(Vec<&'static str>),
    BatchSelect(Vec<&'static str>, usize),
    BatchDelete(usize),
    BatchDeleteIntermediate(usize),
}

/// Two-hop batch selects join the referenced table with the intermediate table.
#[derive(Debug, Clone)]
struct JoinedTables {
    referenced: TableName,
    owner_key_alias: String,
}

/// SQL templates of one relation for one dialect.
pub struct TemplateBundle {
    dialect: String,
    shape: Shape,
    joined: Option<JoinedTables>,
    set_null: Option<Statement>,
    delete: Delete,
    rendered: Cache<RenderKey, Arc<str>>,
}

impl std::fmt::Debug for TemplateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateBundle")
            .field("dialect", &self.dialect)
            .field("property", &self.shape.property)
            .finish_non_exhaustive()
    }
}

impl TemplateBundle {
    pub(crate) fn build(shape: &Shape, dialect: &dyn Dialect) -> Result<Self> {
        let joined = shape.bridge.as_ref().map(|bridge| joined_tables(shape, bridge)).transpose()?;

        let set_null = shape.bridge.is_none().then(|| set_null_statement(shape, dialect));
        let delete = Delete {
            main: delete_main(shape, dialect, 1),
            intermediate: shape
                .bridge
                .as_ref()
                .map(|bridge| delete_intermediate(shape, bridge, dialect, 1)),
            cascade_in_db: shape.cascade_in_db,
        };

        tracing::debug!(
            dialect = dialect.id(),
            entity = shape.owner.name,
            property = shape.property,
            referenced = shape.referenced.table,
            "built join templates"
        );

        Ok(Self {
            dialect: dialect.id().to_string(),
            shape: shape.clone(),
            joined,
            set_null,
            delete,
            rendered: Cache::builder().max_capacity(RENDER_CACHE_CAPACITY).build(),
        })
    }

    /// Id of the dialect the bundle was built with.
    #[must_use]
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Output column carrying the owner key in two-hop batch selects.
    #[must_use]
    pub fn owner_key_alias(&self) -> Option<&str> {
        self.joined.as_ref().map(|joined| joined.owner_key_alias.as_str())
    }

    /// Select the related rows of one owner.
    ///
    /// An empty `columns` selects every field of the referenced entity.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::DialectMismatch`] if `dialect` isn't the bundle's dialect,
    /// or [`JoinError::UnknownColumn`] for columns the referenced entity lacks.
    pub fn select(&self, dialect: &dyn Dialect, columns: &[&str]) -> Result<Statement> {
        self.check_dialect(dialect)?;
        let projection = self.projection(columns)?;
        Ok(self.select_projection(dialect, projection))
    }

    /// Select the related rows of `batch` owners.
    ///
    /// Direct relations extend the projection with the referenced join columns so rows
    /// can be grouped; a batch of one reuses the single select. Two-hop relations join
    /// the intermediate table and add the owner key as [`Self::owner_key_alias`].
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::DialectMismatch`] if `dialect` isn't the bundle's dialect,
    /// [`JoinError::InvalidBatchSize`] for a batch of zero, or
    /// [`JoinError::UnknownColumn`] for columns the referenced entity lacks.
    pub fn batch_select(
        &self, dialect: &dyn Dialect, columns: &[&str], batch: usize,
    ) -> Result<Statement> {
        self.check_dialect(dialect)?;
        if batch == 0 {
            return Err(JoinError::InvalidBatchSize(batch));
        }
        let mut projection = self.projection(columns)?;

        let (Some(joined), Some(bridge)) = (&self.joined, &self.shape.bridge) else {
            for field in &self.shape.target {
                if !projection.contains(&field.name) {
                    projection.push(field.name);
                }
            }
            if batch == 1 {
                return Ok(self.select_projection(dialect, projection));
            }
            let sql = self.render(RenderKey::BatchSelect(projection.clone(), batch), || {
                let table = TableName::new(self.shape.referenced.table);
                let mut statement = dialect.build_select_from(&table);
                statement.exprs(projection.iter().map(|name| column_expr(&table.name, name)));
                statement.and_where(referenced_filter(&self.shape, dialect, batch).into_expr());
                dialect.render_select(&statement)
            });
            return Ok(self.statement(sql, batch));
        };

        let sql = self.render(RenderKey::BatchSelect(projection.clone(), batch), || {
            let qualifier = joined.referenced.qualifier();
            let mut statement = dialect.build_select_from(&joined.referenced);
            statement.exprs(projection.iter().map(|name| column_expr(qualifier, name)));
            statement.expr_as(
                column_expr(bridge.entity.table, bridge.near.name),
                Alias::new(&joined.owner_key_alias),
            );
            statement.join(
                JoinType::InnerJoin,
                Alias::new(bridge.entity.table),
                Filter::ColEq(
                    Column::new(qualifier, self.shape.target[0].name),
                    Column::new(bridge.entity.table, bridge.far.name),
                )
                .into_expr(),
            );
            statement.and_where(Filter::batch_eq(&owner_columns(&self.shape), batch).into_expr());
            dialect.render_select(&statement)
        });
        Ok(self.statement(sql, batch))
    }

    /// Null out the referenced join columns of one owner's related rows.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Unsupported`] for two-hop relations; unlink those with the
    /// intermediate delete instead.
    pub fn set_null(&self) -> Result<Statement> {
        self.set_null.clone().ok_or(JoinError::Unsupported {
            entity: self.shape.owner.name,
            property: self.shape.property,
            operation: "set-null",
        })
    }

    /// Delete one owner's related rows.
    #[must_use]
    pub fn delete(&self) -> Delete {
        self.delete.clone()
    }

    /// Delete the related rows of `batch` owners.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::DialectMismatch`] if `dialect` isn't the bundle's dialect,
    /// or [`JoinError::InvalidBatchSize`] for a batch of zero.
    pub fn batch_delete(&self, dialect: &dyn Dialect, batch: usize) -> Result<Delete> {
        self.check_dialect(dialect)?;
        match batch {
            0 => Err(JoinError::InvalidBatchSize(batch)),
            1 => Ok(self.delete()),
            _ => {
                let main = self.render(RenderKey::BatchDelete(batch), || {
                    delete_main(&self.shape, dialect, batch).sql.to_string()
                });
                let intermediate = self.shape.bridge.as_ref().map(|bridge| {
                    self.render(RenderKey::BatchDeleteIntermediate(batch), || {
                        delete_intermediate(&self.shape, bridge, dialect, batch).sql.to_string()
                    })
                });
                Ok(Delete {
                    main: self.statement(main, batch),
                    intermediate: intermediate.map(|sql| self.statement(sql, batch)),
                    cascade_in_db: self.shape.cascade_in_db,
                })
            }
        }
    }

    // Rendered SQL is memoized without the dialect.
    fn check_dialect(&self, dialect: &dyn Dialect) -> Result<()> {
        if dialect.id() == self.dialect {
            return Ok(());
        }
        Err(JoinError::DialectMismatch {
            expected: self.dialect.clone(),
            found: dialect.id().to_string(),
        })
    }

    fn select_projection(&self, dialect: &dyn Dialect, projection: Vec<&'static str>) -> Statement {
        let sql = self.render(RenderKey::Select(projection.clone()), || {
            let table = TableName::new(self.shape.referenced.table);
            let mut statement = dialect.build_select_from(&table);
            statement.exprs(projection.iter().map(|name| column_expr(&table.name, name)));
            statement.and_where(referenced_filter(&self.shape, dialect, 1).into_expr());
            dialect.render_select(&statement)
        });
        self.statement(sql, 1)
    }

    fn projection(&self, columns: &[&str]) -> Result<Vec<&'static str>> {
        let referenced = &self.shape.referenced;
        if columns.is_empty() {
            return Ok(referenced.fields().iter().map(|field| field.name).collect());
        }
        columns
            .iter()
            .map(|&column| {
                referenced.field(column).map(|field| field.name).ok_or_else(|| {
                    JoinError::UnknownColumn {
                        table: referenced.table,
                        column: column.to_string(),
                    }
                })
            })
            .collect()
    }

    fn render(&self, key: RenderKey, build: impl FnOnce() -> String) -> Arc<str> {
        self.rendered.get_with(key, || {
            let sql = build();
            tracing::debug!(
                dialect = %self.dialect,
                property = self.shape.property,
                sql = %sql,
                "rendered join SQL"
            );
            Arc::from(sql)
        })
    }

    fn statement(&self, sql: Arc<str>, batch: usize) -> Statement {
        Statement {
            sql,
            binder: Binder::new(&self.shape.owner_key, Arc::from([]), batch),
        }
    }
}

/// Columns compared with the owner key: the referenced join columns of a direct
/// relation, the near bridging column of a two-hop relation.
fn owner_columns(shape: &Shape) -> Vec<(Column, Value)> {
    match &shape.bridge {
        None => shape
            .target
            .iter()
            .map(|field| (Column::new(shape.referenced.table, field.name), field.column_type.null()))
            .collect(),
        Some(bridge) => vec![(
            Column::new(bridge.entity.table, bridge.near.name),
            bridge.near.column_type.null(),
        )],
    }
}

/// Restricts the referenced table (unaliased) to the rows of `batch` owners.
fn referenced_filter(shape: &Shape, dialect: &dyn Dialect, batch: usize) -> Filter {
    let owners = Filter::batch_eq(&owner_columns(shape), batch);
    let Some(bridge) = &shape.bridge else {
        return owners;
    };

    let mut middle = dialect.build_select(vec![column_expr(bridge.entity.table, bridge.far.name)]);
    middle.from(Alias::new(bridge.entity.table));
    middle.and_where(owners.into_expr());
    Filter::InSubquery(Column::new(shape.referenced.table, shape.target[0].name), Box::new(middle))
}

fn set_null_statement(shape: &Shape, dialect: &dyn Dialect) -> Statement {
    let defaults: Vec<Value> = shape.target.iter().map(|field| field.default_value()).collect();

    let mut update = dialect.build_update(&TableName::new(shape.referenced.table));
    for (field, value) in shape.target.iter().zip(&defaults) {
        update.value(Alias::new(field.name), value.clone());
    }
    update.and_where(referenced_filter(shape, dialect, 1).into_expr());

    Statement {
        sql: Arc::from(dialect.render_update(&update)),
        binder: Binder::new(&shape.owner_key, Arc::from(defaults), 1),
    }
}

fn delete_main(shape: &Shape, dialect: &dyn Dialect, batch: usize) -> Statement {
    let mut delete = dialect.build_delete(&TableName::new(shape.referenced.table));
    delete.and_where(referenced_filter(shape, dialect, batch).into_expr());
    Statement {
        sql: Arc::from(dialect.render_delete(&delete)),
        binder: Binder::new(&shape.owner_key, Arc::from([]), batch),
    }
}

fn delete_intermediate(
    shape: &Shape, bridge: &Bridge, dialect: &dyn Dialect, batch: usize,
) -> Statement {
    let mut delete = dialect.build_delete(&TableName::new(bridge.entity.table));
    delete.and_where(Filter::batch_eq(&owner_columns(shape), batch).into_expr());
    Statement {
        sql: Arc::from(dialect.render_delete(&delete)),
        binder: Binder::new(&shape.owner_key, Arc::from([]), batch),
    }
}

/// Decide how the referenced table is named in two-hop joins.
///
/// Columns are always table-qualified; when the two tables share a column name the
/// referenced table is additionally aliased so the shared name is never resolved
/// against the wrong table.
fn joined_tables(shape: &Shape, bridge: &Bridge) -> Result<JoinedTables> {
    let referenced = &shape.referenced;
    let intermediate = &bridge.entity;
    let ambiguous = |column: &str| JoinError::Ambiguous {
        column: column.to_string(),
        left: referenced.table.to_string(),
        right: intermediate.table.to_string(),
    };

    let shared: Option<&FieldDef> =
        referenced.fields().iter().find(|field| intermediate.field(field.name).is_some());
    let table = if shared.is_some() || referenced.table == intermediate.table {
        let alias = format!("{}_ref", referenced.table);
        if alias == intermediate.table {
            return Err(ambiguous(shared.map_or("*", |field| field.name)));
        }
        TableName::aliased(referenced.table, alias)
    } else {
        TableName::new(referenced.table)
    };

    let owner_key_alias = shape.owner_key_alias().unwrap_or_default();
    if referenced.field(&owner_key_alias).is_some() {
        return Err(ambiguous(&owner_key_alias));
    }

    Ok(JoinedTables {
        referenced: table,
        owner_key_alias,
    })
}
