//! Integration tests for grouping related rows onto their owners.

#![allow(missing_docs)]

mod common;

use common::{
    Backlog, Employee, MODULE, Order, OrderLine, Project, Tag, Task, employee, lenient_resolver,
    project, resolver,
};
use omnia_join::{Grouped, JoinError, JoinKey};

fn ids(projects: &[Project]) -> Vec<i64> {
    projects.iter().map(|project| project.id).collect()
}

#[test]
fn collection_receives_matches_in_order() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut employees = vec![employee(1), employee(2)];
    let related = vec![project(10, 1), project(11, 1), project(12, 99)];

    projects.populate(&mut employees, related).unwrap();

    assert_eq!(ids(&employees[0].projects), vec![10, 11]);
    assert!(employees[1].projects.is_empty());
}

#[test]
fn scalar_receives_first_match() {
    let lead = resolver().resolve::<Employee>(MODULE, "employees", "lead_project").unwrap();
    let mut employees = vec![employee(1), employee(2)];
    let related = vec![project(11, 1), project(10, 1), project(20, 2)];

    lead.populate(&mut employees, related).unwrap();

    assert_eq!(employees[0].lead_project.as_ref().map(|p| p.id), Some(11));
    assert_eq!(employees[1].lead_project.as_ref().map(|p| p.id), Some(20));
}

#[test]
fn deque_receives_matches_in_order() {
    let queue = resolver().resolve::<Backlog>(MODULE, "backlogs", "queue").unwrap();
    assert_eq!(queue.cardinality(), omnia_join::Cardinality::Collection);

    let mut backlogs = vec![Backlog { employee_id: 1, ..Backlog::default() }];
    queue.populate(&mut backlogs, vec![project(12, 1), project(10, 2), project(11, 1)]).unwrap();

    let ids: Vec<_> = backlogs[0].queue.iter().map(|project| project.id).collect();
    assert_eq!(ids, vec![12, 11]);
}

#[test]
fn unmatched_owner_is_untouched() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut owner = employee(3);
    owner.projects = vec![project(1, 3)];
    let mut employees = vec![owner];

    projects.populate(&mut employees, vec![project(10, 1)]).unwrap();

    assert_eq!(ids(&employees[0].projects), vec![1]);
}

#[test]
fn grouping_is_reusable() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let grouped = projects.group(vec![project(10, 1), project(11, 2), project(12, 1)]).unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped.get(&JoinKey::from(1_i64)).map(ids), Some(vec![10, 12]));

    let mut first = vec![employee(1)];
    let mut second = vec![employee(2), employee(1)];
    projects.populate_grouped(&mut first, &grouped).unwrap();
    projects.populate_grouped(&mut second, &grouped).unwrap();

    assert_eq!(ids(&first[0].projects), vec![10, 12]);
    assert_eq!(ids(&second[0].projects), vec![11]);
    assert_eq!(ids(&second[1].projects), vec![10, 12]);
}

#[test]
fn nullable_target_matches_present_values() {
    let tasks = resolver().resolve::<Employee>(MODULE, "employees", "tasks").unwrap();
    let mut employees = vec![employee(1)];
    let related = vec![
        Task { id: 1, assignee_id: Some(1) },
        Task { id: 2, assignee_id: None },
        Task { id: 3, assignee_id: Some(1) },
    ];

    tasks.populate(&mut employees, related).unwrap();

    let ids: Vec<_> = employees[0].tasks.iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn composite_keys_group_component_wise() {
    let lines = resolver().resolve::<Order>(MODULE, "orders", "lines").unwrap();
    let order = |region: &str, number| Order {
        region: region.to_string(),
        number,
        ..Order::default()
    };
    let line = |id, region: &str, number| OrderLine {
        id,
        order_region: region.to_string(),
        order_number: number,
        ..OrderLine::default()
    };
    let mut orders = vec![order("eu", 1), order("us", 1), order("eu", 2)];
    let related = vec![line(1, "eu", 1), line(2, "eu", 2), line(3, "us", 1), line(4, "eu", 1)];

    lines.populate(&mut orders, related).unwrap();

    let ids = |order: &Order| order.lines.iter().map(|line| line.id).collect::<Vec<_>>();
    assert_eq!(ids(&orders[0]), vec![1, 4]);
    assert_eq!(ids(&orders[1]), vec![3]);
    assert_eq!(ids(&orders[2]), vec![2]);
}

#[test]
fn null_owner_key_fails_populate() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut employees = vec![employee(1), employee(0)];
    let err = projects.populate(&mut employees, vec![project(10, 0)]).unwrap_err();
    assert_eq!(
        err,
        JoinError::NullKey {
            entity: "Employee",
            field: "employee_id",
        }
    );
}

#[test]
fn key_error_leaves_every_owner_unchanged() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut employees = vec![employee(1), employee(0)];
    let err = projects.populate(&mut employees, vec![project(10, 1)]).unwrap_err();

    assert!(matches!(err, JoinError::NullKey { .. }), "{err}");
    assert!(employees[0].projects.is_empty());
    assert!(employees[1].projects.is_empty());
}

#[test]
fn null_owner_key_joins_when_allowed() {
    let projects =
        lenient_resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut employees = vec![employee(0)];
    projects.populate(&mut employees, vec![project(10, 0)]).unwrap();
    assert_eq!(ids(&employees[0].projects), vec![10]);
}

#[test]
fn two_hop_populates_from_grouped_rows() {
    let tags = resolver().resolve::<Employee>(MODULE, "employees", "tags").unwrap();
    assert!(matches!(
        tags.group(Vec::<Tag>::new()).unwrap_err(),
        JoinError::Unsupported { .. }
    ));

    // rows of the batch select carry the owner key in the aliased column
    let rows = [(1_i64, "rust"), (2, "go"), (1, "sql")];
    let mut grouped = Grouped::new();
    for (index, (owner, label)) in rows.into_iter().enumerate() {
        let tag = Tag {
            id: i64::try_from(index).unwrap(),
            label: label.to_string(),
        };
        grouped.insert(owner, tag);
    }

    let mut employees = vec![employee(1), employee(2), employee(3)];
    tags.populate_grouped(&mut employees, &grouped).unwrap();

    let labels = |employee: &Employee| {
        employee.tags.iter().map(|tag| tag.label.clone()).collect::<Vec<_>>()
    };
    assert_eq!(labels(&employees[0]), vec!["rust", "sql"]);
    assert_eq!(labels(&employees[1]), vec!["go"]);
    assert!(employees[2].tags.is_empty());
}

#[test]
fn wrong_related_entity_rejected() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut employees = vec![employee(1)];
    let err = projects.populate(&mut employees, vec![Tag::default()]).unwrap_err();
    assert_eq!(
        err,
        JoinError::EntityMismatch {
            expected: "Project",
            found: "Tag",
        }
    );
}

#[test]
fn wrong_owner_entity_rejected() {
    let projects = resolver().resolve::<Employee>(MODULE, "employees", "projects").unwrap();
    let mut orders = vec![Order::default()];
    let grouped: Grouped<Project> = Grouped::new();
    let err = projects.populate_grouped(&mut orders, &grouped).unwrap_err();
    assert!(matches!(err, JoinError::EntityMismatch { expected: "Employee", found: "Order" }));
}
