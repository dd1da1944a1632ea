use crate::db::LATEST_SCHEMA_VERSION;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let db = Database::open(&config.database.path, config.database.pool_size)?;

    let before = db.schema_version()?;
    db.migrate()?;
    let after = db.schema_version()?;

    if after > before {
        tracing::info!("Migrated schema from version {} to {}", before, after);
    } else {
        tracing::info!("Schema already at version {}", LATEST_SCHEMA_VERSION);
    }

    Ok(())
}
