use sea_query::{Alias, ColumnRef, Expr, IntoIden, SelectStatement, SimpleExpr, Value};

/// Table-qualified column reference.
///
/// The table part is whatever name the statement uses for the table: the table name
/// itself or its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Table name or alias.
    pub table: String,
    /// Column name.
    pub name: String,
}

impl Column {
    /// Column `name` of `table`.
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }

    /// ``SeaQuery`` column reference.
    #[must_use]
    pub fn to_ref(&self) -> ColumnRef {
        table_column(&self.table, &self.name)
    }
}

/// WHERE-clause fragments used to build join templates.
///
/// Values are placeholders only: templates are rendered once and the real values are
/// supplied by a binder at execution time, in the order the fragments are rendered.
#[derive(Debug, Clone)]
pub enum Filter {
    /// table.column = value
    Eq(Column, Value),
    /// table.column IN (values)
    In(Column, Vec<Value>),
    /// table.column IN (sub-select)
    InSubquery(Column, Box<SelectStatement>),
    /// Column-to-column comparison: table1.col1 = table2.col2
    ColEq(Column, Column),
    /// Logical AND of multiple filters
    And(Vec<Self>),
    /// Logical OR of multiple filters
    Or(Vec<Self>),
}

impl Filter {
    /// Convert Filter to ``SeaQuery`` ``SimpleExpr``.
    #[must_use]
    pub fn into_expr(self) -> SimpleExpr {
        match self {
            Self::Eq(col, val) => Expr::col(col.to_ref()).eq(val),
            Self::In(col, vals) => Expr::col(col.to_ref()).is_in(vals),
            Self::InSubquery(col, select) => Expr::col(col.to_ref()).in_subquery(*select),
            Self::ColEq(left, right) => Expr::col(left.to_ref()).eq(Expr::col(right.to_ref())),
            Self::And(filters) => {
                let mut exprs = filters.into_iter().map(Self::into_expr);
                exprs.next().map_or_else(
                    || Expr::value(true), // no filters, so all conditions satisfied, hence `true`
                    |first| exprs.fold(first, sea_query::SimpleExpr::and),
                )
            }
            Self::Or(filters) => {
                let mut exprs = filters.into_iter().map(Self::into_expr);
                exprs.next().map_or_else(
                    || Expr::value(false), // no filters, so 0 conditions satisfied, hence `false`
                    |first| exprs.fold(first, sea_query::SimpleExpr::or),
                )
            }
        }
    }

    /// Equality on every column, AND-ed: `c1 = ? AND c2 = ? ...`.
    ///
    /// A single column yields a plain equality rather than a one-element AND.
    #[must_use]
    pub fn all_eq(columns: &[(Column, Value)]) -> Self {
        match columns {
            [(column, value)] => Self::Eq(column.clone(), value.clone()),
            _ => Self::And(
                columns.iter().map(|(column, value)| Self::Eq(column.clone(), value.clone())).collect(),
            ),
        }
    }

    /// Batched point lookup for `batch` keys over `columns`.
    ///
    /// One column becomes `c IN (?, ...)`; several columns become `batch` OR-ed copies
    /// of the AND-ed equality block. A batch of one is the plain equality.
    #[must_use]
    pub fn batch_eq(columns: &[(Column, Value)], batch: usize) -> Self {
        match columns {
            _ if batch == 1 => Self::all_eq(columns),
            [(column, value)] => Self::In(column.clone(), vec![value.clone(); batch]),
            _ => Self::Or((0..batch).map(|_| Self::all_eq(columns)).collect()),
        }
    }
}

/// ``SeaQuery`` reference to `table.column`.
pub fn table_column(table: &str, column: &str) -> ColumnRef {
    ColumnRef::TableColumn(Alias::new(table).into_iden(), Alias::new(column).into_iden())
}
