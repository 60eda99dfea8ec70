mod helpers;
use helpers::memory_connection;
use oci_engine::native::memory::QueryOutput;
use oci_engine::native::{BindType, BindValue, NativeError};
use oci_engine::{
    EngineConfig, Errata, OciError, ParamValue, ParameterContainer, Row, Statement, Value,
};

#[test]
fn test_select_bound_string_fetches_associative_row() {
    let (client, conn) = memory_connection();
    client.on_query("SELECT :x FROM DUAL", |ctx| {
        let x = ctx.value("x").unwrap_or(Value::Null);
        Ok(QueryOutput::rows(vec!["X"], vec![vec![x]]))
    });

    let mut stmt = Statement::new(conn);
    stmt.prepare(Some("SELECT :x FROM DUAL")).unwrap();
    stmt.parameter_container_mut()
        .set_with_errata("x", "hello", Errata::String);
    stmt.execute(()).unwrap();

    let row = stmt.fetch(None, None).unwrap().unwrap();
    match &row {
        Row::Associative(columns) => {
            assert_eq!(columns.len(), 1);
            assert_eq!(columns.get("X"), Some(&Value::from("hello")));
        }
        other => panic!("Expected associative row, got {:?}", other),
    }
    assert_eq!(stmt.fetch(None, None).unwrap(), None);
}

#[test]
fn test_prepare_twice_is_runtime_error() {
    let (_client, conn) = memory_connection();
    let mut stmt = Statement::new(conn);
    stmt.prepare(Some("SELECT 1 FROM dual")).unwrap();
    assert!(matches!(
        stmt.prepare(Some("SELECT 2 FROM dual")),
        Err(OciError::Runtime { .. })
    ));
    assert_eq!(stmt.sql(), Some("SELECT 1 FROM dual"));
}

#[test]
fn test_execute_prepares_exactly_once_before_binding() {
    let (client, conn) = memory_connection();
    let mut stmt = Statement::new(conn);
    stmt.set_sql("UPDATE users SET name = :name WHERE id = :id");
    stmt.execute(vec![
        ("name", ParamValue::from("zed")),
        ("id", ParamValue::Integer(2)),
    ])
    .unwrap();

    assert_eq!(client.parse_count(), 1);
    let handle = stmt.resource().unwrap();
    let binds = client.binds(handle);
    assert_eq!(binds.len(), 2);
    assert!(binds.iter().all(|b| b.bind_type == BindType::Chr));
}

#[test]
fn test_container_keeps_semantic_values_after_execute() {
    let (client, conn) = memory_connection();
    let mut params = ParameterContainer::new();
    params
        .set_with_errata("n", "12", Errata::Integer)
        .set_with_errata("d", 3.5, Errata::Double)
        .set_with_errata("s", "text", Errata::String)
        .set_with_errata("doc", "body", Errata::Lob)
        .set_with_errata(
            "ids",
            ParamValue::Array(vec![ParamValue::Integer(1), ParamValue::Integer(2)]),
            Errata::NumberArray,
        )
        .set_with_errata("out_cur", ParamValue::Null, Errata::Cursor);
    let before = params.clone();

    let mut stmt = Statement::new(conn);
    stmt.set_sql("BEGIN pkg.save(:n, :d, :s, :doc, :ids, :out_cur); END;");
    stmt.set_parameter_container(params);
    stmt.execute(()).unwrap();
    stmt.execute(()).unwrap();

    assert_eq!(stmt.parameter_container(), Some(&before));
    assert_eq!(client.live_collections(), 0);
    assert_eq!(client.live_lobs(), 0);
}

#[test]
fn test_lob_bind_types() {
    let (client, conn) = memory_connection();
    client.on_query("INSERT INTO docs VALUES (:empty_doc, :full_doc)", |ctx| {
        assert_eq!(ctx.value("full_doc"), Some(Value::from("payload")));
        Ok(QueryOutput::affected(1))
    });

    let mut stmt = Statement::new(conn);
    stmt.set_sql("INSERT INTO docs VALUES (:empty_doc, :full_doc)");
    stmt.parameter_container_mut()
        .set_with_errata("empty_doc", "", Errata::Lob)
        .set_with_errata("full_doc", "payload", Errata::Lob);
    let result = stmt.execute(()).unwrap();
    assert_eq!(result.affected_rows().unwrap(), 1);

    let binds = client.binds(stmt.resource().unwrap());
    let empty = binds.iter().find(|b| b.name == "empty_doc").unwrap();
    let full = binds.iter().find(|b| b.name == "full_doc").unwrap();
    assert_eq!(empty.bind_type, BindType::Chr);
    assert_eq!(empty.value, BindValue::Text(String::new()));
    assert_eq!(full.bind_type, BindType::Clob);
    assert!(matches!(full.value, BindValue::Lob(_)));
}

#[test]
fn test_execute_failure_reports_native_error() {
    let (client, conn) = memory_connection();
    client.fail_execute(
        "orders",
        NativeError::new(1400, "cannot insert NULL into (\"APP\".\"ORDERS\".\"ID\")"),
    );

    let mut stmt = Statement::new(conn);
    stmt.set_sql("INSERT INTO orders (id) VALUES (:id)");
    let err = stmt.execute(vec![("id", ParamValue::Null)]).err().unwrap();
    assert_eq!(err.native_code(), 1400);
    assert!(err.message().contains("cannot insert NULL"));
    assert!(stmt.is_prepared());

    // Still usable after the failure.
    assert!(stmt.close_cursor().unwrap());
}

#[test]
fn test_strict_errata_rejects_unknown_tags() {
    let (client, conn) = memory_connection();
    let config = EngineConfig {
        strict_errata: true,
        ..EngineConfig::default()
    };
    let mut stmt = Statement::with_config(conn, config);
    stmt.set_sql("SELECT :x FROM dual");
    stmt.parameter_container_mut()
        .set("x", "<a/>")
        .set_errata_tag("x", "xmltype");

    assert!(matches!(
        stmt.execute(()).err(),
        Some(OciError::InvalidArgument(_))
    ));
    assert!(client.executions().is_empty());
}

#[test]
fn test_debug_parameter_never_reaches_server() {
    let (client, conn) = memory_connection();
    let mut stmt = Statement::new(conn);
    stmt.set_sql("SELECT :x FROM dual");
    stmt.execute(vec![
        ("x", ParamValue::from("v")),
        ("p_DEBUG", ParamValue::Integer(1)),
    ])
    .unwrap();

    let names: Vec<String> = client
        .binds(stmt.resource().unwrap())
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["x"]);
}

#[test]
fn test_fetch_column_reads_current_row() {
    let (client, conn) = memory_connection();
    client.on_query("SELECT id, name FROM users", |_| {
        Ok(QueryOutput::rows(
            vec!["ID", "NAME"],
            vec![vec![Value::Integer(1), Value::from("ann")]],
        ))
    });

    let mut stmt = Statement::new(conn);
    stmt.set_sql("SELECT id, name FROM users");
    let mut result = stmt.execute(()).unwrap();
    assert_eq!(result.field_count().unwrap(), 2);
    assert!(result
        .fetch(Some(oci_engine::FetchStyle::Indexed), None)
        .unwrap()
        .is_some());
    assert_eq!(result.fetch_column(1, None).unwrap(), Some(Value::from("ann")));
}
