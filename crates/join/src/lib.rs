//! Relationship join resolution for the Omnia ORM.
//!
//! Turns declarative join specs on entity relation fields into validated, cached
//! descriptors with dialect-specific SQL templates, key extractors and in-memory
//! grouping of related rows back onto their owners. Executing the SQL is left to the
//! caller's driver.
//!
//! # Quick Start
//!
//! ## Declare Relations
//!
//! ```ignore
//! entity! {
//!     table = "employees",
//!     relations = [
//!         // direct: projects.employee_id = employees.employee_id
//!         projects: Vec<Project> = "employee_id",
//!         // two-hop through the employee_projects table
//!         assignments: Vec<Project> = "employee_id = EmployeeProject.employee_id, EmployeeProject.project_id = id",
//!     ],
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Employee {
//!         pub employee_id: i64,
//!         pub name: String,
//!     }
//! }
//! ```
//!
//! ## Resolve and Query
//!
//! ```ignore
//! let resolver = JoinResolver::new(Schema::new().entity::<EmployeeProject>());
//! let projects = resolver.resolve::<Employee>(module_path!(), "employees", "projects")?;
//!
//! let dialect = SqlDialect::postgres();
//! let query = projects.batch_select(&dialect, &["id", "title"], employees.len())?
//!     .batch_query(&employees)?;
//! // SELECT "projects"."id", "projects"."title", "projects"."employee_id" FROM "projects"
//! //   WHERE "projects"."employee_id" IN ($1, $2)
//! ```
//!
//! ## Populate
//!
//! ```ignore
//! let rows: Vec<Project> = execute(query)?;
//! projects.populate(&mut employees, rows)?;
//! ```
//!
//! Two-hop batch selects return the owner key in the
//! [`JoinDescriptor::owner_key_alias`] column; group those rows with [`Grouped::insert`]
//! and assign them with [`JoinDescriptor::populate_grouped`].

mod descriptor;
mod dialect;
mod entity;
mod error;
mod filter;
mod key;
mod options;
mod populate;
mod resolver;
mod schema;
pub mod spec;
mod template;

pub use descriptor::{Bridge, JoinDescriptor};
pub use dialect::{Dialect, SqlDialect, TableName, column_expr};
pub use entity::{
    Cardinality, ColumnType, ColumnValue, Entity, EntityRef, FieldDef, Record, RelationDef,
    RelationSlot,
};
pub use error::{JoinError, Result};
pub use filter::{Column, Filter};
pub use key::{JoinKey, KeyExtractor, KeyPart};
pub use options::JoinOptions;
pub use populate::Grouped;
pub use resolver::{Descriptors, JoinResolver};
pub use schema::Schema;
pub use spec::{SpecError, Topology};
pub use template::{Binder, Delete, Query, Statement, TemplateBundle};

// Re-exports for ``entity`` macro use only.
#[doc(hidden)]
pub mod __private {
    pub use sea_query::Value;
}
