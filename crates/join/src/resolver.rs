use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use moka::sync::Cache;

use crate::descriptor::JoinDescriptor;
use crate::entity::Entity;
use crate::error::{JoinError, Result};
use crate::options::JoinOptions;
use crate::schema::Schema;

type CacheKey = (String, TypeId, String);

/// Descriptors of every relation of one entity, keyed by relation field name.
pub type Descriptors = Arc<HashMap<&'static str, Arc<JoinDescriptor>>>;

/// Resolves and caches [`JoinDescriptor`]s.
///
/// One resolver is typically shared by every DAO of an application. Descriptors of an
/// entity are built together on first access for a `(module, entity, table)` triple and
/// returned as the same `Arc` on every later call.
///
/// # Examples
///
/// ```ignore
/// let resolver = JoinResolver::new(Schema::new().entity::<EmployeeProject>())
///     .with_module_options("app::dao::employees", JoinOptions::default().allow_null_join_key(true));
///
/// let projects = resolver.resolve::<Employee>("app::dao::employees", "employees", "projects")?;
/// let statement = projects.batch_select(&SqlDialect::postgres(), &[], employees.len())?;
/// ```
pub struct JoinResolver {
    schema: Schema,
    options: JoinOptions,
    module_options: HashMap<String, JoinOptions>,
    cache: Cache<CacheKey, Descriptors>,
}

impl std::fmt::Debug for JoinResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinResolver")
            .field("entities", &self.schema.len())
            .field("options", &self.options)
            .field("module_options", &self.module_options)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl JoinResolver {
    /// Resolver over `schema` using default options.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: JoinOptions::default(),
            module_options: HashMap::new(),
            cache: Cache::builder().build(),
        }
    }

    /// Resolver configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the join options can't be loaded.
    pub fn from_env(schema: Schema) -> anyhow::Result<Self> {
        Ok(Self::new(schema).with_options(JoinOptions::load()?))
    }

    /// Options used by modules without explicit options.
    #[must_use]
    pub const fn with_options(mut self, options: JoinOptions) -> Self {
        self.options = options;
        self
    }

    /// Options for descriptors resolved under `module`.
    #[must_use]
    pub fn with_module_options(mut self, module: impl Into<String>, options: JoinOptions) -> Self {
        self.module_options.insert(module.into(), options);
        self
    }

    /// Options in effect for `module`.
    #[must_use]
    pub fn options(&self, module: &str) -> JoinOptions {
        self.module_options.get(module).copied().unwrap_or(self.options)
    }

    /// Entity registry used to locate intermediate entities.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Descriptor of relation `property` of `E` stored in `table`, resolved under the
    /// options of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::UnknownRelation`] if `E` declares no such relation, or the
    /// configuration error of any invalid relation of `E`.
    pub fn resolve<E: Entity>(
        &self, module: &str, table: &str, property: &str,
    ) -> Result<Arc<JoinDescriptor>> {
        self.resolve_all::<E>(module, table)?.get(property).cloned().ok_or_else(|| {
            JoinError::UnknownRelation {
                entity: E::NAME,
                property: property.to_string(),
            }
        })
    }

    /// Descriptors of every relation of `E` stored in `table`.
    ///
    /// Construction happens once per `(module, E, table)`; concurrent first callers
    /// wait for the single construction. Errors are returned to every waiting caller
    /// and are not cached.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first invalid relation of `E`.
    #[tracing::instrument(skip(self), fields(entity = E::NAME))]
    pub fn resolve_all<E: Entity>(&self, module: &str, table: &str) -> Result<Descriptors> {
        let key = (module.to_string(), TypeId::of::<E>(), table.to_string());
        self.cache
            .try_get_with(key, || {
                let options = self.options(module);
                let descriptors = E::relations()
                    .iter()
                    .map(|relation| {
                        let descriptor =
                            JoinDescriptor::resolve::<E>(&self.schema, table, relation, options)?;
                        Ok((relation.property, Arc::new(descriptor)))
                    })
                    .collect::<Result<HashMap<_, _>>>()?;
                tracing::debug!(relations = descriptors.len(), "cached join descriptors");
                Ok::<_, JoinError>(Arc::new(descriptors))
            })
            .map_err(|e| (*e).clone())
    }

    /// Drop the cached descriptors of `E` in `table`. The next resolve rebuilds them.
    pub fn invalidate<E: Entity>(&self, module: &str, table: &str) {
        self.cache.invalidate(&(module.to_string(), TypeId::of::<E>(), table.to_string()));
    }
}
