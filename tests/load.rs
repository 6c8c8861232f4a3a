mod common;

use common::{TestWorkspace, open_memory_db, table_rows};
use csv_loader::{
    database::{Database, DatabaseError},
    error::LoadError,
    loader::{RowErrorPolicy, bulk_load},
    pipeline::{self, LoadOptions},
    schema::{Column, Schema, TypeTag},
    table_builder::build_table,
};
use encoding_rs::UTF_8;

#[test]
fn load_creates_typed_table_and_inserts_every_row() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "people.csv",
        "userId,fullName,balance\n1,Ann  Lee,10.5\n2,O'Brien,\n3,  Bo ,0.25\n",
    );
    let db = open_memory_db();

    let summary = pipeline::run(&db, &LoadOptions::new(&input)).expect("load");

    assert_eq!(summary.table, "people");
    assert_eq!(summary.report.inserted, 3);
    assert_eq!(summary.report.failed(), 0);
    assert!(summary.dedup.is_none());
    assert_eq!(
        db.column_names("people").expect("columns"),
        vec!["user_id", "full_name", "balance"]
    );
    assert_eq!(
        table_rows(&db, "people"),
        vec![
            vec!["1".to_string(), "Ann Lee".to_string(), "10.5".to_string()],
            vec!["2".to_string(), "O'Brien".to_string(), String::new()],
            vec!["3".to_string(), "Bo".to_string(), "0.25".to_string()],
        ]
    );
}

#[test]
fn declared_types_match_inferred_schema() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("typed.csv", "a,b,c,d\n1,1.5,x,\n");
    let db = open_memory_db();
    pipeline::run(&db, &LoadOptions::new(&input)).expect("load");

    let declared: Vec<String> = db
        .columns("typed")
        .expect("columns")
        .into_iter()
        .map(|column| column.declared_type)
        .collect();
    assert_eq!(declared, vec!["BIGINT", "DECIMAL", "TEXT", "TEXT"]);
}

fn bigint_table(db: &dyn Database) -> Schema {
    let schema = Schema {
        columns: vec![Column::with_type("n", TypeTag::BigInt)],
    };
    build_table(db, "nums", &schema).expect("build");
    schema
}

#[test]
fn value_that_does_not_fit_column_type_is_a_row_failure() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("nums.csv", "n\n1\nabc\n");
    let db = open_memory_db();
    let schema = bigint_table(&db);

    let report = bulk_load(&db, "nums", &schema, &input, b',', UTF_8, RowErrorPolicy::Continue)
        .expect("load completes");

    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].line, 3);
    assert_eq!(table_rows(&db, "nums"), vec![vec!["1".to_string()]]);
}

#[test]
fn value_that_does_not_fit_column_type_aborts_under_abort_policy() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("nums.csv", "n\n1\nabc\n2\n");
    let db = open_memory_db();
    let schema = bigint_table(&db);

    let err = bulk_load(&db, "nums", &schema, &input, b',', UTF_8, RowErrorPolicy::Abort)
        .unwrap_err();

    assert!(matches!(
        err,
        LoadError::RowAborted {
            line: 3,
            source: DatabaseError::Rejected(_),
            ..
        }
    ));
    assert_eq!(table_rows(&db, "nums"), vec![vec!["1".to_string()]]);
}

#[test]
fn reloading_same_table_replaces_previous_contents() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("first.csv", "old_col,other\n1,a\n2,b\n");
    let second = workspace.write("second.csv", "fresh\nz\n");
    let db = open_memory_db();

    pipeline::run(&db, &LoadOptions::new(&first).table("shared")).expect("first load");
    pipeline::run(&db, &LoadOptions::new(&second).table("shared")).expect("second load");

    assert_eq!(db.column_names("shared").expect("columns"), vec!["fresh"]);
    assert_eq!(table_rows(&db, "shared"), vec![vec!["z".to_string()]]);
}

#[test]
fn rejected_rows_are_reported_and_loading_continues() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("ragged.csv", "a,b\n1,2\n3,4,5\n6,7\n");
    let db = open_memory_db();

    let summary = pipeline::run(&db, &LoadOptions::new(&input)).expect("load");

    assert_eq!(summary.report.inserted, 2);
    assert_eq!(summary.report.failures.len(), 1);
    assert_eq!(summary.report.failures[0].line, 3);
    assert_eq!(table_rows(&db, "ragged").len(), 2);
}

#[test]
fn abort_policy_stops_at_first_rejected_row() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("ragged.csv", "a,b\n1,2\n3,4,5\n6,7\n");
    let db = open_memory_db();

    let err = pipeline::run(
        &db,
        &LoadOptions::new(&input).row_errors(RowErrorPolicy::Abort),
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::RowAborted { line: 3, .. }));
    assert_eq!(table_rows(&db, "ragged"), vec![vec!["1".to_string(), "2".to_string()]]);
}

#[test]
fn missing_table_turns_every_insert_into_a_row_failure() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("rows.csv", "a\n1\n2\n");
    let db = open_memory_db();
    let schema = Schema {
        columns: vec![Column::with_type("a", TypeTag::BigInt)],
    };

    let report = bulk_load(
        &db,
        "never_created",
        &schema,
        &input,
        b',',
        UTF_8,
        RowErrorPolicy::Continue,
    )
    .expect("load completes");

    assert_eq!(report.inserted, 0);
    assert_eq!(report.failed(), 2);
}

#[test]
fn bulk_load_skips_only_the_header() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("nums.csv", "n\n1\n2\n3\n");
    let db = open_memory_db();
    let schema = Schema {
        columns: vec![Column::with_type("n", TypeTag::BigInt)],
    };
    build_table(&db, "nums", &schema).expect("build");

    let report = bulk_load(&db, "nums", &schema, &input, b',', UTF_8, RowErrorPolicy::Abort)
        .expect("load");

    assert_eq!(report.inserted, 3);
}

#[test]
fn invalid_table_name_fails_before_touching_database() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("my-data.csv", "a\n1\n");
    let db = open_memory_db();

    let err = pipeline::run(&db, &LoadOptions::new(&input)).unwrap_err();

    assert!(matches!(err, LoadError::InvalidTableName(name) if name == "my-data"));
}

#[test]
fn missing_input_is_fatal() {
    let workspace = TestWorkspace::new();
    let db = open_memory_db();
    let err = pipeline::run(&db, &LoadOptions::new(workspace.path().join("absent.csv")))
        .unwrap_err();
    assert!(matches!(err, LoadError::Input { .. }));
}

#[test]
fn tab_delimited_input_loads_with_resolved_delimiter() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("events.tsv", "kind\tcount\nclick\t4\n");
    let db = open_memory_db();

    pipeline::run(&db, &LoadOptions::new(&input)).expect("load");

    assert_eq!(
        table_rows(&db, "events"),
        vec![vec!["click".to_string(), "4".to_string()]]
    );
}
