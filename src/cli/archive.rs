use crate::services::{archive, download_status};
use crate::{Config, Database};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub async fn run(
    config_path: &Path,
    event_id: i64,
    album_id: Option<i64>,
    output: &Path,
    record: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let db = Database::open(&config.database.path, config.database.pool_size)?;
    db.migrate()?;

    let upload_root = config.media.upload_root();
    let archive = tokio::task::spawn_blocking({
        let db = db.clone();
        move || archive::build_archive(&db, &upload_root, event_id, album_id)
    })
    .await??;

    let target = output_path(output, &archive.file_name);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let scope = archive.scope;
    let included = archive.summary.included();
    let skipped = archive.summary.skipped();
    archive
        .persist(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!(
        "Wrote {} ({} entries, {} skipped)",
        target.display(),
        included,
        skipped
    );

    if record {
        let status = download_status::record_archive_build(&db, event_id, scope)?;
        println!("Download status: {}", status);
    }

    Ok(())
}

fn output_path(output: &Path, file_name: &str) -> PathBuf {
    let is_zip = output
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if is_zip {
        output.to_path_buf()
    } else {
        output.join(file_name)
    }
}
