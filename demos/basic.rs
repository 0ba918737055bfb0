use json_shelf::{Backend, Shelf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), json_shelf::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("json_shelf_example_basic.json");
    let _ = std::fs::remove_file(&path);

    // write inside a scope: persisted when the closure returns Ok
    let mut db = Shelf::<String>::open(Backend::Json, &path)?;
    db.scoped(|db| {
        db.set("key", &"value".to_string())?;
        println!("'key' in db        = {}", db.contains("key")?);
        println!("'anotherkey' in db = {}", db.contains("anotherkey")?);
        Ok::<_, json_shelf::Error>(())
    })?;
    db.dispose()?;

    // reopen and read it back
    let mut db = Shelf::<String>::open(Backend::Json, &path)?;
    println!("key = {}", db.get("key")?);

    // the rest of the mapping surface
    db.extend([("apples", "3".to_string()), ("bananas", "5".to_string())])?;
    db.update("apples", |n| n.push('!'))?;
    let oranges = db.get_or_insert_with("oranges", || "0".to_string())?;
    println!("oranges (default) = {oranges}");
    println!("keys  = {:?}", db.keys()?);
    println!("items = {:?}", db.items()?);
    println!("len   = {}", db.len()?);

    db.close()?;
    let _ = std::fs::remove_file(&path);
    Ok(())
}
