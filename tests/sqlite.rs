use json_shelf::{Backend, Error, MapBackend, Shelf, SqliteBackend};
use serde_json::{json, Value};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("json_shelf_test_sqlite_{}.db", name))
}

#[test]
fn scenario_set_persist_reopen_delete() {
    let path = temp_path("scenario");
    let _ = std::fs::remove_file(&path);
    {
        let mut db = Shelf::<Value>::open(Backend::Sqlite, &path).unwrap();
        db.set("x", &json!({"n": 2})).unwrap();
        db.persist().unwrap();
        db.dispose().unwrap();
    }
    let mut db = Shelf::<Value>::open(Backend::Sqlite, &path).unwrap();
    assert_eq!(db.get("x").unwrap(), json!({"n": 2}));
    db.delete("x").unwrap();
    assert_eq!(db.get("x").unwrap_err(), Error::NotFound("x".into()));
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn uncommitted_writes_are_visible_then_rolled_back() {
    let path = temp_path("rollback");
    let _ = std::fs::remove_file(&path);
    {
        let mut db = Shelf::<i32>::open(Backend::Sqlite, &path).unwrap();
        db.set("kept", &1).unwrap();
        db.persist().unwrap();

        db.set("lost", &2).unwrap();
        db.delete("kept").unwrap();
        // same handle sees its own transaction
        assert_eq!(db.get("lost").unwrap(), 2);
        assert!(!db.contains("kept").unwrap());
        db.dispose().unwrap();
    }
    let db = Shelf::<i32>::open(Backend::Sqlite, &path).unwrap();
    assert_eq!(db.get("kept").unwrap(), 1);
    assert!(!db.contains("lost").unwrap());
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn materialized_keys_then_mutate_does_not_block() {
    let path = temp_path("materialize");
    let _ = std::fs::remove_file(&path);
    let mut db = Shelf::<i32>::open(Backend::Sqlite, &path).unwrap();
    db.extend((0..20).map(|i| (format!("k{i}"), i))).unwrap();
    db.persist().unwrap();

    let keys: Vec<String> = db.iter_keys().unwrap().collect::<Result<_, _>>().unwrap();
    for key in &keys {
        db.set(key, &-1).unwrap();
    }
    for key in db.keys().unwrap() {
        db.delete(&key).unwrap();
    }
    db.persist().unwrap();
    assert_eq!(db.len().unwrap(), 0);
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn stream_keys_walks_live_cursor() {
    let path = temp_path("stream");
    let _ = std::fs::remove_file(&path);
    let mut db = Shelf::from_backend(SqliteBackend::open(&path).unwrap());
    for k in ["c", "a", "b"] {
        db.set(k, &k.to_uppercase()).unwrap();
    }
    db.persist().unwrap();

    let streamed: Vec<String> = {
        let mut cursor = db.stream_keys().unwrap();
        let keys = cursor.keys().unwrap().map(|k| k.unwrap()).collect();
        keys
    };
    assert_eq!(streamed, vec!["c", "a", "b"]);

    // Cursor dropped part way: the statement is finalized and writes go on.
    {
        let mut cursor = db.stream_keys().unwrap();
        let first = cursor.keys().unwrap().next().unwrap().unwrap();
        assert_eq!(first, "c");
    }
    db.set("d", &"D".to_string()).unwrap();
    db.persist().unwrap();
    assert_eq!(db.len().unwrap(), 4);
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn stream_keys_on_empty_table() {
    let path = temp_path("stream_empty");
    let _ = std::fs::remove_file(&path);
    let db = SqliteBackend::open(&path).unwrap();
    let mut cursor = db.stream_keys().unwrap();
    assert_eq!(cursor.keys().unwrap().count(), 0);
    drop(cursor);
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn custom_table_is_independent() {
    let path = temp_path("tables");
    let _ = std::fs::remove_file(&path);
    {
        let mut a = Shelf::<i32>::builder(&path).table("alpha").build().unwrap();
        a.set("k", &1).unwrap();
        a.close().unwrap();
    }
    {
        let mut b = Shelf::<i32>::builder(&path).table("beta").build().unwrap();
        assert!(!b.contains("k").unwrap());
        b.set("k", &2).unwrap();
        b.close().unwrap();
    }
    let a = Shelf::<i32>::builder(&path).table("alpha").build().unwrap();
    assert_eq!(a.get("k").unwrap(), 1);
    drop(a);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn bad_table_name_is_config_error() {
    let path = temp_path("bad_table");
    let err = SqliteBackend::open_with_table(&path, "x; DROP TABLE y").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    let err = Shelf::<i32>::builder(&path).table("").build().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn non_database_file_is_corrupt_data() {
    let path = temp_path("garbage");
    std::fs::write(&path, vec![b'x'; 4096]).unwrap();
    let err = SqliteBackend::open(&path).unwrap_err();
    assert!(matches!(err, Error::CorruptData(_)), "{err:?}");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unopenable_path_is_io_error() {
    let path = std::env::temp_dir()
        .join("json_shelf_missing_dir")
        .join("nested")
        .join("x.db");
    let err = SqliteBackend::open(&path).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
}

#[test]
fn malformed_row_is_corrupt_data() {
    let path = temp_path("bad_row");
    let _ = std::fs::remove_file(&path);
    {
        let db = SqliteBackend::open(&path).unwrap();
        db.dispose_and_inject("INSERT INTO shelf (key, value) VALUES ('k', '{not json')");
    }
    let db = SqliteBackend::open(&path).unwrap();
    assert!(matches!(db.get("k").unwrap_err(), Error::CorruptData(_)));
    drop(db);
    let _ = std::fs::remove_file(&path);
}

trait Inject {
    fn dispose_and_inject(self, sql: &str);
}

impl Inject for SqliteBackend {
    // Write a row behind the backend's back through a second connection.
    fn dispose_and_inject(mut self, sql: &str) {
        let path = self.path().to_path_buf();
        self.dispose().unwrap();
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(sql).unwrap();
    }
}

#[test]
fn clear_is_one_statement_and_rolls_back_without_persist() {
    let path = temp_path("clear_rollback");
    let _ = std::fs::remove_file(&path);
    {
        let mut db = SqliteBackend::open(&path).unwrap();
        db.set("a", json!(1)).unwrap();
        db.set("b", json!(2)).unwrap();
        db.persist().unwrap();
        db.clear().unwrap();
        assert_eq!(db.len().unwrap(), 0);
    }
    let db = SqliteBackend::open(&path).unwrap();
    assert_eq!(db.len().unwrap(), 2);
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn table_without_primary_key_still_upserts() {
    let path = temp_path("legacy_schema");
    let _ = std::fs::remove_file(&path);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE jsonshelve (key TEXT, value TEXT);
             INSERT INTO jsonshelve (key, value) VALUES ('old', '\"kept\"');",
        )
        .unwrap();
    }

    let mut db = Shelf::<Value>::builder(&path)
        .backend(Backend::Sqlite)
        .table("jsonshelve")
        .build()
        .unwrap();
    assert_eq!(db.get("old").unwrap(), json!("kept"));
    db.set("a", &json!(1)).unwrap();
    db.set("a", &json!(2)).unwrap();
    db.set("old", &json!("replaced")).unwrap();
    assert_eq!(db.get("a").unwrap(), json!(2));
    assert_eq!(db.get("old").unwrap(), json!("replaced"));
    assert_eq!(db.len().unwrap(), 2);
    db.close().unwrap();

    let db = SqliteBackend::open_with_table(&path, "jsonshelve").unwrap();
    assert_eq!(db.keys().unwrap(), vec!["old".to_string(), "a".to_string()]);
    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn duplicate_keys_in_existing_table_are_corrupt_data() {
    let path = temp_path("legacy_dupes");
    let _ = std::fs::remove_file(&path);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE jsonshelve (key TEXT, value TEXT);
             INSERT INTO jsonshelve (key, value) VALUES ('k', '1'), ('k', '2');",
        )
        .unwrap();
    }

    let err = SqliteBackend::open_with_table(&path, "jsonshelve").err().unwrap();
    assert!(matches!(err, Error::CorruptData(_)), "{err:?}");
    let _ = std::fs::remove_file(&path);
}
