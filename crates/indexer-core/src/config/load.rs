//! Reads the INI-shaped configuration file into a [`Config`].
//!
//! The wire format (INI, sections `database`/`s3`/`musicbrainz`/`sentry`) is
//! dictated by the system this crate talks to, not chosen for convenience;
//! `rust-ini` is the closest idiomatic match in the pack's dependency
//! universe to that literal requirement.

use std::path::Path;

use ini::Ini;

use crate::error::IndexerError;

use super::types::{Config, DatabaseConfig, MusicBrainzConfig, S3Config, SentryConfig};
use super::validate::validate;

pub fn load(path: impl AsRef<Path>) -> Result<Config, IndexerError> {
    let path = path.as_ref();
    let ini = Ini::load_from_file(path).map_err(|e| {
        IndexerError::Configuration(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = parse(&ini)?;
    validate(&config)?;
    Ok(config)
}

fn parse(ini: &Ini) -> Result<Config, IndexerError> {
    let database = section(ini, "database")?;
    let s3 = section(ini, "s3")?;
    let musicbrainz = section(ini, "musicbrainz")?;

    Ok(Config {
        database: DatabaseConfig {
            host: required(database, "database", "host")?,
            port: required(database, "database", "port")?
                .parse()
                .map_err(|_| IndexerError::Configuration("database.port must be a u16".into()))?,
            user: required(database, "database", "user")?,
            password: required(database, "database", "password")?,
            dbname: required(database, "database", "dbname")?,
        },
        s3: S3Config {
            url: required(s3, "s3", "url")?,
            access: required(s3, "s3", "access")?,
            secret: required(s3, "s3", "secret")?,
        },
        musicbrainz: MusicBrainzConfig {
            url: required(musicbrainz, "musicbrainz", "url")?,
            database: musicbrainz.get("database").map(str::to_owned),
        },
        sentry: ini
            .section(Some("sentry"))
            .map(|sentry| SentryConfig {
                dsn: sentry.get("dsn").map(str::to_owned),
            })
            .unwrap_or_default(),
    })
}

fn section<'a>(ini: &'a Ini, name: &str) -> Result<&'a ini::Properties, IndexerError> {
    ini.section(Some(name))
        .ok_or_else(|| IndexerError::Configuration(format!("missing [{name}] section")))
}

fn required(props: &ini::Properties, section: &str, key: &str) -> Result<String, IndexerError> {
    props
        .get(key)
        .map(str::to_owned)
        .ok_or_else(|| IndexerError::Configuration(format!("missing {section}.{key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const VALID: &str = r#"
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
    fn loads_a_well_formed_file() {
        let file = write_ini(VALID);
        let config = load(file.path()).expect("config should load");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.s3.access, "access-key");
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn missing_section_is_an_error() {
        let file = write_ini("[database]\nhost = localhost\n");
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn optional_sentry_section_is_picked_up() {
        let body = format!("{VALID}\n[sentry]\ndsn = https://example.ingest.sentry.io/1\n");
        let file = write_ini(&body);
        let config = load(file.path()).unwrap();
        assert_eq!(
            config.sentry.dsn.as_deref(),
            Some("https://example.ingest.sentry.io/1")
        );
    }
}
