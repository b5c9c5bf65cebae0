//! Logging to a file.
//!
//! The terminal belongs to the editor, so log output goes to a file. The
//! filter comes from `RUST_LOG` when set, otherwise `segedit=info`.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "segedit=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber writing to `log_path`.
pub fn init_file_logging(log_path: &Path) -> std::io::Result<()> {
    let file = File::create(log_path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(std::io::Error::other)?;
    tracing::info!("logging to {}", log_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::new(DEFAULT_FILTER);
        assert!(filter.to_string().contains("segedit"));
    }
}
