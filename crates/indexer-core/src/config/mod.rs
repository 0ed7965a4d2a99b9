pub mod load;
pub mod types;
pub mod validate;

pub use types::{Config, DatabaseConfig, MusicBrainzConfig, S3Config, SentryConfig};

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::IndexerError;

/// A hot-reloadable handle to the current configuration.
///
/// SIGHUP re-reads the file and atomically swaps the pointer; any handler
/// call already in flight keeps the `Arc<Config>` it captured at the start
/// of the call, so a reload never mutates state out from under in-progress
/// work.
#[derive(Clone)]
pub struct SharedConfig {
    path: PathBuf,
    current: Arc<RwLock<Arc<Config>>>,
}

impl SharedConfig {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, IndexerError> {
        let path = path.into();
        let config = load::load(&path)?;
        Ok(Self {
            path,
            current: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    #[must_use]
    pub fn get(&self) -> Arc<Config> {
        Arc::clone(&self.current.read().expect("config lock poisoned"))
    }

    /// Re-reads and re-validates the file, then swaps it in. On error the
    /// previously loaded configuration is left in place.
    pub fn reload(&self) -> Result<(), IndexerError> {
        let fresh = load::load(&self.path)?;
        *self.current.write().expect("config lock poisoned") = Arc::new(fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"
[database]
host = localhost
port = 5432
user = musicbrainz
password = hunter2
dbname = musicbrainz_db

[s3]
url = https://s3.us.archive.org
access = access-key
secret = secret-key

[musicbrainz]
url = https://musicbrainz.org
"#;

    #[test]
    fn reload_picks_up_file_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BODY.as_bytes()).unwrap();

        let shared = SharedConfig::load(file.path()).unwrap();
        assert_eq!(shared.get().database.port, 5432);

        let updated = BODY.replace("port = 5432", "port = 6543");
        std::fs::write(file.path(), updated).unwrap();
        shared.reload().unwrap();
        assert_eq!(shared.get().database.port, 6543);
    }
}
