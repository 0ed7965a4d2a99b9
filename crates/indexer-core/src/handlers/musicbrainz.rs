//! The concrete handler both shipped projects (CAA, EAA) use. Grounded on
//! `original_source/handlers_base.py::EventHandler`/`MusicBrainzEventHandler`:
//! one handler type, parameterized by a [`ProjectConfig`], replaces that
//! file's class hierarchy.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::MusicBrainzConfig;
use crate::domain::message::{CopyImagePayload, DeindexPayload, DeleteImagePayload, IndexPayload, NoopPayload};
use crate::error::{IndexerError, IndexerResult};

use super::archive_client::ArchiveClient;
use super::catalog::ArtworkCatalog;
use super::project::ProjectConfig;

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn index(&self, payload: &IndexPayload) -> IndexerResult<()>;
    async fn copy_image(&self, payload: &CopyImagePayload) -> IndexerResult<()>;
    async fn delete_image(&self, payload: &DeleteImagePayload) -> IndexerResult<()>;
    async fn deindex(&self, payload: &DeindexPayload) -> IndexerResult<()>;
    async fn noop(&self, payload: &NoopPayload) -> IndexerResult<()>;
}

#[derive(Debug, Serialize)]
struct ImageEntry {
    id: i64,
    image: String,
    thumbnails: Thumbnails,
    comment: String,
    approved: bool,
}

#[derive(Debug, Serialize)]
struct Thumbnails {
    small: String,
    large: String,
}

#[derive(Debug, Serialize)]
struct IndexDocument {
    images: Vec<ImageEntry>,
}

pub struct MusicBrainzHandler {
    project: ProjectConfig,
    archive: ArchiveClient,
    catalog: Box<dyn ArtworkCatalog>,
    metadata_client: Client,
    musicbrainz: MusicBrainzConfig,
}

impl MusicBrainzHandler {
    #[must_use]
    pub fn new(
        project: ProjectConfig,
        archive: ArchiveClient,
        catalog: Box<dyn ArtworkCatalog>,
        metadata_client: Client,
        musicbrainz: MusicBrainzConfig,
    ) -> Self {
        Self {
            project,
            archive,
            catalog,
            metadata_client,
            musicbrainz,
        }
    }

    fn image_key(&self, bucket: &str, artwork_id: i64, suffix: &str) -> String {
        format!("{bucket}-{artwork_id}.{suffix}")
    }

    fn metadata_url(&self, gid: &str) -> String {
        format!(
            "{}/ws/2/{}/{}?inc={}&fmt=xml",
            self.musicbrainz.url.trim_end_matches('/'),
            self.project.entity_type,
            gid,
            self.project.ws_inc_params
        )
    }

    async fn upload_metadata(&self, bucket: &str, gid: &str) -> IndexerResult<()> {
        let url = self.metadata_url(gid);
        let mut request = self.metadata_client.get(&url);
        if let Some(database) = &self.musicbrainz.database {
            request = request.header("mb-set-database", database);
        }
        let response = request
            .send()
            .await
            .map_err(|e| IndexerError::Http { url: url.clone(), source: e })?;
        if !response.status().is_success() {
            return Err(IndexerError::ArchiveResponse {
                status: response.status().as_u16(),
                url,
                body: response.text().await.unwrap_or_default(),
            });
        }
        let xml = response
            .bytes()
            .await
            .map_err(|e| IndexerError::Http { url: self.metadata_url(gid), source: e })?;

        self.archive
            .put_object(
                bucket,
                &format!("{bucket}_mb_metadata.xml"),
                xml.to_vec(),
                "application/xml",
                self.project.ia_collection,
                &[],
            )
            .await
    }

    async fn upload_index(&self, bucket: &str, gid: &str) -> IndexerResult<()> {
        let rows = self.catalog.list_artwork(self.project.entity_type, gid).await?;
        let document = IndexDocument {
            images: rows
                .into_iter()
                .map(|row| {
                    let image_path = self.image_key(bucket, row.id, &row.suffix);
                    ImageEntry {
                        id: row.id,
                        image: format!("https://{}/{}/{}", self.project.domain, bucket, image_path),
                        thumbnails: Thumbnails {
                            small: format!(
                                "https://{}/{}/{}-250.jpg",
                                self.project.domain, bucket, row.id
                            ),
                            large: format!(
                                "https://{}/{}/{}-500.jpg",
                                self.project.domain, bucket, row.id
                            ),
                        },
                        comment: row.comment.unwrap_or_default(),
                        approved: row.approved,
                    }
                })
                .collect(),
        };

        let body = serde_json::to_vec(&document)
            .map_err(|e| IndexerError::MalformedMessage(format!("failed to serialize index: {e}")))?;

        self.archive
            .put_object(bucket, "index.json", body, "application/json", self.project.ia_collection, &[])
            .await
    }
}

#[async_trait]
impl EventHandler for MusicBrainzHandler {
    async fn index(&self, payload: &IndexPayload) -> IndexerResult<()> {
        let bucket = self.project.bucket_name(&payload.gid);
        self.upload_index(&bucket, &payload.gid).await?;
        self.upload_metadata(&bucket, &payload.gid).await
    }

    async fn copy_image(&self, payload: &CopyImagePayload) -> IndexerResult<()> {
        let old_bucket = self.project.bucket_name(&payload.old_gid);
        let new_bucket = self.project.bucket_name(&payload.new_gid);
        let old_key = self.image_key(&old_bucket, payload.artwork_id, &payload.suffix);
        let new_key = self.image_key(&new_bucket, payload.artwork_id, &payload.suffix);
        self.archive
            .copy_object(&old_bucket, &old_key, &new_bucket, &new_key, self.project.ia_collection)
            .await
    }

    async fn delete_image(&self, payload: &DeleteImagePayload) -> IndexerResult<()> {
        let bucket = self.project.bucket_name(&payload.gid);
        let key = self.image_key(&bucket, payload.artwork_id, &payload.suffix);
        self.archive.delete_object(&bucket, &key).await
    }

    async fn deindex(&self, payload: &DeindexPayload) -> IndexerResult<()> {
        let bucket = self.project.bucket_name(&payload.gid);
        self.archive.delete_object(&bucket, "index.json").await
    }

    async fn noop(&self, payload: &NoopPayload) -> IndexerResult<()> {
        if let Some(seconds) = payload.sleep {
            tokio::time::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0))).await;
        }
        if payload.fail {
            return Err(IndexerError::Simulated("noop event requested failure".into()));
        }
        Ok(())
    }
}
