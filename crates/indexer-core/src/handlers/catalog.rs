//! The artwork listing query itself lives in the catalog, which is out of
//! scope here; this module only defines the narrow interface a handler
//! needs to read it back, grounded on
//! `original_source/handlers_base.py::fetch_image_rows`.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::{IndexerError, IndexerResult};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ArtworkRow {
    pub id: i64,
    pub suffix: String,
    pub comment: Option<String>,
    pub approved: bool,
}

#[async_trait]
pub trait ArtworkCatalog: Send + Sync {
    /// Lists artwork currently attached to `gid`, ordered the way the
    /// archive's `index.json` expects (oldest first).
    async fn list_artwork(&self, entity_type: &str, gid: &str) -> IndexerResult<Vec<ArtworkRow>>;
}

/// Per-project SQL for listing artwork, parameterized on `$1 = gid`. The
/// query text itself is catalog-schema-specific and lives next to the
/// project record that owns it (`ProjectConfig::image_listing_query`).
pub struct PostgresArtworkCatalog {
    pool: PgPool,
}

impl PostgresArtworkCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtworkCatalog for PostgresArtworkCatalog {
    async fn list_artwork(&self, entity_type: &str, gid: &str) -> IndexerResult<Vec<ArtworkRow>> {
        let query = match entity_type {
            "release" => CAA_IMAGE_LISTING_QUERY,
            "event" => EAA_IMAGE_LISTING_QUERY,
            other => {
                return Err(IndexerError::UnknownHandler {
                    entity_type: other.to_string(),
                    action: "list_artwork".to_string(),
                })
            }
        };

        sqlx::query_as::<_, ArtworkRow>(query)
            .bind(gid)
            .fetch_all(&self.pool)
            .await
            .map_err(IndexerError::Database)
    }
}

const CAA_IMAGE_LISTING_QUERY: &str = r"
    SELECT ca.id, ca.suffix, ca.comment, ca.approved
    FROM cover_art_archive.cover_art ca
    JOIN musicbrainz.release r ON r.id = ca.release
    WHERE r.gid = $1::uuid
    ORDER BY ca.ordering
";

const EAA_IMAGE_LISTING_QUERY: &str = r"
    SELECT ea.id, ea.suffix, ea.comment, ea.approved
    FROM event_art_archive.event_art ea
    JOIN musicbrainz.event e ON e.id = ea.event
    WHERE e.gid = $1::uuid
    ORDER BY ea.ordering
";
