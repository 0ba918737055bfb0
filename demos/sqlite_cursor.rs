use json_shelf::{Shelf, SqliteBackend};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), json_shelf::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("json_shelf_example_cursor.db");
    let _ = std::fs::remove_file(&path);

    let mut db: Shelf<Value, SqliteBackend> = Shelf::from_backend(SqliteBackend::open(&path)?);
    for i in 0..5 {
        db.set(&format!("user:{i}"), &json!({"id": i, "active": i % 2 == 0}))?;
    }
    db.persist()?;

    // lazy: the statement stays open while the cursor lives
    let mut inactive = Vec::new();
    {
        let mut cursor = db.stream_keys()?;
        for key in cursor.keys()? {
            let key = key?;
            if db.get(&key)?["active"] == json!(false) {
                inactive.push(key);
            }
        }
    }

    // cursor gone, mutations are allowed again
    for key in &inactive {
        db.delete(key)?;
    }
    db.persist()?;
    println!("removed {:?}, left {:?}", inactive, db.keys()?);

    db.dispose()?;
    let _ = std::fs::remove_file(&path);
    Ok(())
}
