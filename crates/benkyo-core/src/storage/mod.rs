pub mod config;
pub mod database;

pub use config::Config;
pub use database::{Category, Database, DayTotal, SessionRow, Stats};

use std::path::PathBuf;

/// Returns `~/.config/benkyo[-dev]/` based on BENKYO_ENV.
///
/// Set BENKYO_ENV=dev to use the development data directory. BENKYO_DATA_DIR
/// overrides the location wholesale; tests point it at a temp dir.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(dir) = std::env::var("BENKYO_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BENKYO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("benkyo-dev")
    } else {
        base_dir.join("benkyo")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
