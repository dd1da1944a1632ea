use crate::db::LATEST_SCHEMA_VERSION;
use crate::services::video::EncoderLocator;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

#[derive(Debug, PartialEq)]
enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "\x1b[32m✓ OK\x1b[0m"),
            CheckStatus::Warn => write!(f, "\x1b[33m⚠ WARN\x1b[0m"),
            CheckStatus::Fail => write!(f, "\x1b[31m✗ FAIL\x1b[0m"),
        }
    }
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

pub async fn run(config_path: &Path) -> Result<()> {
    println!("\n  guestbox doctor\n");

    let mut results: Vec<CheckResult> = Vec::new();

    // Configuration
    let config = match Config::load_or_default(config_path) {
        Ok(c) => {
            match c.validate() {
                Ok(()) => results.push(CheckResult::new(
                    "Configuration",
                    CheckStatus::Ok,
                    if config_path.exists() {
                        format!("Loaded from {}", config_path.display())
                    } else {
                        format!("{} not found, using defaults", config_path.display())
                    },
                )),
                Err(e) => results.push(CheckResult::new(
                    "Configuration",
                    CheckStatus::Fail,
                    format!("Validation error: {}", e),
                )),
            }
            Some(c)
        }
        Err(e) => {
            results.push(CheckResult::new(
                "Configuration",
                CheckStatus::Fail,
                format!("Failed to load: {}", e),
            ));
            None
        }
    };

    if let Some(config) = &config {
        results.push(check_database(config));
        results.push(check_upload_dir(config));
        results.push(check_encoder(config));
    }

    print_results(&results);

    if results.iter().any(|r| r.status == CheckStatus::Fail) {
        println!("\n  \x1b[31mSome checks failed. Fix the issues above before serving.\x1b[0m\n");
    } else {
        println!("\n  \x1b[32mAll checks passed.\x1b[0m\n");
    }

    Ok(())
}

fn check_database(config: &Config) -> CheckResult {
    let db = match Database::open(&config.database.path, config.database.pool_size) {
        Ok(db) => db,
        Err(e) => {
            return CheckResult::new("Database", CheckStatus::Fail, format!("Cannot open: {}", e))
        }
    };
    if !matches!(db.health_check(), Ok(true)) {
        return CheckResult::new(
            "Database",
            CheckStatus::Fail,
            "Health check returned unexpected result",
        );
    }
    match db.schema_version() {
        Ok(v) if v >= LATEST_SCHEMA_VERSION => CheckResult::new(
            "Database",
            CheckStatus::Ok,
            format!("{} at schema version {}", config.database.path, v),
        ),
        Ok(v) => CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!(
                "At schema version {}/{}. Run `guestbox migrate`",
                v, LATEST_SCHEMA_VERSION
            ),
        ),
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("Could not read schema version: {}", e),
        ),
    }
}

fn check_upload_dir(config: &Config) -> CheckResult {
    let root = config.media.upload_root();
    match std::fs::metadata(&root) {
        Ok(meta) if !meta.is_dir() => CheckResult::new(
            "Upload directory",
            CheckStatus::Fail,
            format!("{} is not a directory", root.display()),
        ),
        Ok(meta) if meta.permissions().readonly() => CheckResult::new(
            "Upload directory",
            CheckStatus::Fail,
            format!("{} is read-only", root.display()),
        ),
        Ok(_) => CheckResult::new(
            "Upload directory",
            CheckStatus::Ok,
            format!("{} is writable", root.display()),
        ),
        Err(_) => CheckResult::new(
            "Upload directory",
            CheckStatus::Warn,
            format!("{} does not exist yet; it is created on first start", root.display()),
        ),
    }
}

fn check_encoder(config: &Config) -> CheckResult {
    match EncoderLocator::new(&config.video.encoder_paths).locate() {
        Ok(path) => CheckResult::new("Video encoder", CheckStatus::Ok, path.display().to_string()),
        Err(e) => CheckResult::new(
            "Video encoder",
            CheckStatus::Warn,
            format!("{}. Video uploads will fail", e),
        ),
    }
}

fn print_results(results: &[CheckResult]) {
    let max_name_len = results.iter().map(|r| r.name.len()).max().unwrap_or(20);

    for (i, result) in results.iter().enumerate() {
        println!(
            "  {:>2}. {:<width$}  {}  {}",
            i + 1,
            result.name,
            result.status,
            result.detail,
            width = max_name_len,
        );
    }
}
