pub mod archive_client;
pub mod catalog;
pub mod dispatch;
pub mod musicbrainz;
pub mod project;

pub use archive_client::ArchiveClient;
pub use catalog::{ArtworkCatalog, ArtworkRow, PostgresArtworkCatalog};
pub use dispatch::HandlerRegistry;
pub use musicbrainz::{EventHandler, MusicBrainzHandler};
pub use project::{ProjectConfig, CAA_PROJECT, EAA_PROJECT};
