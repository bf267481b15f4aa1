//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;

use omnia_join::{JoinOptions, JoinResolver, Schema, entity};

// Common test entities used across multiple test files

entity! {
    table = "employees",
    relations = [
        projects: Vec<Project> = "employee_id",
        lead_project: Option<Project> = "employee_id",
        tasks: Vec<Task> = "employee_id = assignee_id",
        assignments: Vec<Project> = "employee_id = EmployeeProject.employee_id, EmployeeProject.project_id = id",
        tags: Vec<Tag> = "employee_id = EmployeeTag.employee_id, EmployeeTag.tag_id = id",
    ],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Employee {
        pub employee_id: i64,
        pub name: String,
    }
}

entity! {
    table = "projects",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Project {
        pub id: i64,
        pub employee_id: i64,
        pub title: String,
    }
}

entity! {
    table = "employee_projects",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct EmployeeProject {
        pub employee_id: i64,
        pub project_id: i64,
    }
}

entity! {
    table = "tags",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Tag {
        pub id: i64,
        pub label: String,
    }
}

entity! {
    table = "employee_tags",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct EmployeeTag {
        pub employee_id: i64,
        pub tag_id: i64,
    }
}

entity! {
    table = "tasks",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Task {
        pub id: i64,
        pub assignee_id: Option<i64>,
    }
}

entity! {
    table = "backlogs",
    relations = [
        queue: VecDeque<Project> = "employee_id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct Backlog {
        pub employee_id: i64,
    }
}

// Composite keys

entity! {
    table = "orders",
    relations = [
        region_lines: Vec<OrderLine> = "region = order_region",
        lines: Vec<OrderLine> = "region = order_region, number = order_number",
        year_lines: Vec<OrderLine> = "region = order_region, number = order_number, year = order_year",
    ],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Order {
        pub region: String,
        pub number: i64,
        pub year: i32,
    }
}

entity! {
    table = "order_lines",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct OrderLine {
        pub id: i64,
        pub order_region: String,
        pub order_number: i64,
        pub order_year: i32,
        pub sku: String,
    }
}

// Aliasing the referenced table as `parts_ref` collides with the intermediate table.

entity! {
    table = "assemblies",
    relations = [
        parts: Vec<Part> = "id = PartsRef.assembly_id, PartsRef.part_id = id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct Assembly {
        pub id: i64,
    }
}

entity! {
    table = "parts",
    #[derive(Debug, Clone, Default)]
    pub struct Part {
        pub id: i64,
        pub assembly_id: i64,
    }
}

entity! {
    table = "parts_ref",
    #[derive(Debug, Clone, Default)]
    pub struct PartsRef {
        pub assembly_id: i64,
        pub part_id: i64,
    }
}

// Invalid relations, one per entity so each resolves to its own error

entity! {
    table = "three_pairs",
    relations = [
        projects: Vec<Project> = "employee_id = EmployeeProject.employee_id, EmployeeProject.project_id = id, name = title",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct ThreePairs {
        pub employee_id: i64,
        pub name: String,
    }
}

entity! {
    table = "mismatched",
    relations = [
        projects: Vec<Project> = "name = id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct Mismatched {
        pub name: String,
    }
}

entity! {
    table = "missing_bridge",
    relations = [
        projects: Vec<Project> = "employee_id = Missing.employee_id, Missing.project_id = id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct MissingBridge {
        pub employee_id: i64,
    }
}

entity! {
    table = "unknown_field",
    relations = [
        projects: Vec<Project> = "employee_id = owner_id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct UnknownField {
        pub employee_id: i64,
    }
}

entity! {
    table = "near_mismatch",
    relations = [
        projects: Vec<Project> = "code = EmployeeProject.employee_id, EmployeeProject.project_id = id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct NearMismatch {
        pub code: String,
    }
}

entity! {
    table = "far_mismatch",
    relations = [
        tags: Vec<Tag> = "employee_id = EmployeeTag.employee_id, EmployeeTag.tag_id = label",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct FarMismatch {
        pub employee_id: i64,
    }
}

entity! {
    table = "unknown_bridge_field",
    relations = [
        projects: Vec<Project> = "employee_id = EmployeeProject.owner_id, EmployeeProject.project_id = id",
    ],
    #[derive(Debug, Clone, Default)]
    pub struct UnknownBridgeField {
        pub employee_id: i64,
    }
}

pub const MODULE: &str = "app::dao";

pub fn schema() -> Schema {
    Schema::new().entity::<EmployeeProject>().entity::<EmployeeTag>().entity::<PartsRef>()
}

pub fn resolver() -> JoinResolver {
    JoinResolver::new(schema())
}

pub fn lenient_resolver() -> JoinResolver {
    JoinResolver::new(schema()).with_options(JoinOptions::default().allow_null_join_key(true))
}

pub fn employee(employee_id: i64) -> Employee {
    Employee {
        employee_id,
        name: format!("employee {employee_id}"),
        ..Employee::default()
    }
}

pub fn project(id: i64, employee_id: i64) -> Project {
    Project {
        id,
        employee_id,
        title: format!("project {id}"),
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' if !in_single_quote => {}
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Identifier quotes and whitespace differences are ignored.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}

/// Number of `?` placeholders in SQL rendered with the `SQLite` dialect.
pub fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}
