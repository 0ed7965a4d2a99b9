//! Validation applied once at load time, so a bad config fails fast at
//! startup (or at SIGHUP) rather than at the first handler call that needs
//! the missing value.

use crate::error::IndexerError;

use super::types::Config;

pub fn validate(config: &Config) -> Result<(), IndexerError> {
    require_nonempty("database.host", &config.database.host)?;
    require_nonempty("database.user", &config.database.user)?;
    require_nonempty("database.dbname", &config.database.dbname)?;
    if config.database.port == 0 {
        return Err(IndexerError::Configuration(
            "database.port must be nonzero".into(),
        ));
    }

    require_nonempty("s3.url", &config.s3.url)?;
    require_url("s3.url", &config.s3.url)?;
    require_nonempty("s3.access", &config.s3.access)?;
    require_nonempty("s3.secret", &config.s3.secret)?;

    require_nonempty("musicbrainz.url", &config.musicbrainz.url)?;
    require_url("musicbrainz.url", &config.musicbrainz.url)?;

    if let Some(dsn) = &config.sentry.dsn {
        require_url("sentry.dsn", dsn)?;
    }

    Ok(())
}

fn require_nonempty(field: &str, value: &str) -> Result<(), IndexerError> {
    if value.trim().is_empty() {
        return Err(IndexerError::Configuration(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<(), IndexerError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(IndexerError::Configuration(format!(
            "{field} must be an http(s) URL, got {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DatabaseConfig, MusicBrainzConfig, S3Config, SentryConfig};

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".into(),
                port: 5432,
                user: "musicbrainz".into(),
                password: "secret".into(),
                dbname: "musicbrainz_db".into(),
            },
            s3: S3Config {
                url: "https://s3.us.archive.org".into(),
                access: "access".into(),
                secret: "secret".into(),
            },
            musicbrainz: MusicBrainzConfig {
                url: "https://musicbrainz.org".into(),
                database: None,
            },
            sentry: SentryConfig::default(),
        }
    }

    #[test]
    fn accepts_well_formed_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_empty_host() {
        let mut config = valid_config();
        config.database.host.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_non_http_s3_url() {
        let mut config = valid_config();
        config.s3.url = "s3.us.archive.org".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = valid_config();
        config.database.port = 0;
        assert!(validate(&config).is_err());
    }
}
