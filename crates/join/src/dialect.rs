//! SQL dialects.
//!
//! A [`Dialect`] supplies the four statement primitives join templates are built
//! from and renders finished statements to SQL text with placeholders.

use std::fmt::Debug;

use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{
    Alias, BinOper, DeleteStatement, Oper, Quote, SelectStatement, SimpleExpr,
    SubQueryStatement, UpdateStatement, Value,
};

/// Statement primitives and rendering for one SQL dialect.
///
/// Template bundles are cached per [`Dialect::id`], so two dialects with the same id
/// must render identically.
pub trait Dialect: Debug + Send + Sync {
    /// Cache key for template bundles built with this dialect.
    fn id(&self) -> &str;

    /// `SELECT <columns>` with no source table.
    fn build_select(&self, columns: Vec<SimpleExpr>) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        statement.exprs(columns);
        statement
    }

    /// `SELECT ... FROM <table> [AS alias]` with no columns.
    fn build_select_from(&self, table: &TableName) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        match &table.alias {
            Some(alias) => statement.from_as(Alias::new(&table.name), Alias::new(alias)),
            None => statement.from(Alias::new(&table.name)),
        };
        statement
    }

    /// `UPDATE <table>` with no assignments.
    fn build_update(&self, table: &TableName) -> UpdateStatement {
        let mut statement = sea_query::Query::update();
        statement.table(Alias::new(&table.name));
        statement
    }

    /// `DELETE FROM <table>`.
    fn build_delete(&self, table: &TableName) -> DeleteStatement {
        let mut statement = sea_query::Query::delete();
        statement.from_table(Alias::new(&table.name));
        statement
    }

    /// Render a SELECT statement.
    fn render_select(&self, statement: &SelectStatement) -> String;

    /// Render an UPDATE statement.
    fn render_update(&self, statement: &UpdateStatement) -> String;

    /// Render a DELETE statement.
    fn render_delete(&self, statement: &DeleteStatement) -> String;
}

/// A table as named in a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    /// Table name.
    pub name: String,
    /// Alias, applied where the statement allows one.
    pub alias: Option<String>,
}

impl TableName {
    /// Unaliased table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Aliased table.
    #[must_use]
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// The name columns are qualified with: the alias if set, otherwise the table name.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Quoting and placeholder style shared by the built-in dialects.
#[derive(Debug, Clone, Copy)]
pub struct SqlDialect {
    id: &'static str,
    builder: QueryBuilder,
}

impl SqlDialect {
    /// Dialect with a custom id, quote character and placeholder style.
    ///
    /// `numbered` placeholders render as `$1, $2, ...`, otherwise the placeholder is
    /// repeated verbatim.
    #[must_use]
    pub fn new(id: &'static str, quote: u8, placeholder: &'static str, numbered: bool) -> Self {
        Self {
            id,
            builder: QueryBuilder {
                quote: Quote::new(quote),
                placeholder,
                numbered,
            },
        }
    }

    /// `PostgreSQL`: `"ident"`, `$1`.
    #[must_use]
    pub fn postgres() -> Self {
        Self::new("postgres", b'"', "$", true)
    }

    /// `SQLite`: `"ident"`, `?`.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new("sqlite", b'"', "?", false)
    }

    /// `MySQL`: `` `ident` ``, `?`.
    #[must_use]
    pub fn mysql() -> Self {
        Self::new("mysql", b'`', "?", false)
    }
}

impl Default for SqlDialect {
    // should work for `Postgres` and `Sqlite`
    fn default() -> Self {
        Self::postgres()
    }
}

impl Dialect for SqlDialect {
    fn id(&self) -> &str {
        self.id
    }

    fn render_select(&self, statement: &SelectStatement) -> String {
        statement.build(self.builder).0
    }

    fn render_update(&self, statement: &UpdateStatement) -> String {
        statement.build(self.builder).0
    }

    fn render_delete(&self, statement: &DeleteStatement) -> String {
        statement.build(self.builder).0
    }
}

/// Column expression `table.column`.
#[must_use]
pub fn column_expr(table: &str, column: &str) -> SimpleExpr {
    SimpleExpr::Column(crate::filter::table_column(table, column))
}

#[derive(Debug, Clone, Copy)]
struct QueryBuilder {
    quote: Quote,
    placeholder: &'static str, // "?" or "$"
    numbered: bool,            // false for "?", true for "$1, $2, ..."
}

impl QuotedBuilder for QueryBuilder {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for QueryBuilder {}

impl TableRefBuilder for QueryBuilder {}

impl OperLeftAssocDecider for QueryBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        // Copied from sea-query 0.32.7 backend/query_builder.rs `common_well_known_left_associative`
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for QueryBuilder {
    fn inner_expr_well_known_greater_precedence(
        &self, _inner: &SimpleExpr, _outer_oper: &Oper,
    ) -> bool {
        // Conservative approach that forces parentheses
        false
    }
}

impl sea_query::backend::QueryBuilder for QueryBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    // Every value, NULL included, becomes a placeholder so templates can be bound later.
    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }
}
