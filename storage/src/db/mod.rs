pub mod schemas;

use std::path::PathBuf;

use log::info;
use surrealdb::{
    Surreal,
    engine::local::{Db, Mem, SurrealKv},
};
use tracing::instrument;

pub const NAMESPACE: &str = "cadence";
pub const DATABASE: &str = "offline";

/// Open an on-disk database at `path`, creating it if it does not exist.
///
/// # Errors
///
/// Returns an error if the datastore cannot be opened or the namespace cannot be selected.
#[instrument]
pub async fn init_database(path: PathBuf) -> surrealdb::Result<Surreal<Db>> {
    let db = Surreal::new::<SurrealKv>(path).await?;
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    info!("Connected to offline audio database");
    Ok(db)
}

/// Open a database that lives only as long as the returned handle.
///
/// # Errors
///
/// Returns an error if the datastore cannot be created or the namespace cannot be selected.
#[instrument]
pub async fn init_memory_database() -> surrealdb::Result<Surreal<Db>> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    Ok(db)
}
