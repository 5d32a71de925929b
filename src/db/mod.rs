pub mod migrations;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Shared handle to the single SQLite connection. rusqlite is synchronous,
/// so callers run their queries inside `tokio::task::spawn_blocking` and
/// take the lock there.
pub type DbPool = Arc<Mutex<Connection>>;

/// Open (or create) the database under `data_dir` and bring the schema up
/// to date.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let path = Path::new(data_dir).join("huddle.db");
    let mut conn = Connection::open(&path)?;

    // WAL keeps concurrent readers from blocking the writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations::migrations().to_latest(&mut conn)?;
    tracing::info!("Database ready at {}", path.display());

    Ok(Arc::new(Mutex::new(conn)))
}
