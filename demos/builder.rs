use json_shelf::{Backend, FlushPolicy, Shelf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), json_shelf::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("json_shelf_example_builder.json");

    // pretty-printed JSON, persisted after every write
    let mut db = Shelf::<String>::builder(&path)
        .backend(Backend::Json)
        .pretty(true)
        .policy(FlushPolicy::Immediate)
        .build()?;

    db.set("name", &"json-shelf".to_string())?;
    db.set("version", &"0.1.0".to_string())?;
    db.set("status", &"shelved".to_string())?;

    // the file on disk is already up to date and nicely indented
    let contents = std::fs::read_to_string(db.path())?;
    println!("On-disk JSON:\n{contents}");

    println!("\nDebug output: {db:?}");

    // the same data moved into a SQLite shelf picked by name
    let db_path = path.with_extension("db");
    let backend: Backend = "sqlite".parse()?;
    let mut sql = Shelf::<String>::open(backend, &db_path)?;
    sql.extend(db.items()?)?;
    sql.close()?;

    db.close()?;
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(&db_path);
    Ok(())
}
