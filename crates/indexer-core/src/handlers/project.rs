//! Project records replace the original class hierarchy
//! (`ReleaseEventHandler`/`EventEventHandler` subclassing a common base) with
//! one handler type parameterized by a plain data record. Grounded on
//! `original_source/projects.py`'s `CAA_PROJECT`/`EAA_PROJECT` dicts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Catalog entity type this project indexes, e.g. `"release"` or
    /// `"event"`. Matches `event_queue.entity_type`.
    pub entity_type: &'static str,
    /// Remote archive domain, e.g. `coverartarchive.org`.
    pub domain: &'static str,
    /// `x-archive-meta-collection` value for every upload under this
    /// project's buckets.
    pub ia_collection: &'static str,
    /// Bucket name prefix; the full bucket is `{bucket_prefix}-{gid}`.
    pub bucket_prefix: &'static str,
    /// Webservice `inc` parameters appended to the metadata fetch URL.
    pub ws_inc_params: &'static str,
}

pub const CAA_PROJECT: ProjectConfig = ProjectConfig {
    entity_type: "release",
    domain: "coverartarchive.org",
    ia_collection: "coverartarchive",
    bucket_prefix: "mbid",
    ws_inc_params: "artists",
};

pub const EAA_PROJECT: ProjectConfig = ProjectConfig {
    entity_type: "event",
    domain: "eventartarchive.org",
    ia_collection: "eventartarchive",
    bucket_prefix: "mbid",
    ws_inc_params: "artist-rels+place-rels",
};

impl ProjectConfig {
    #[must_use]
    pub fn bucket_name(&self, gid: &str) -> String {
        format!("{}-{}", self.bucket_prefix, gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_combines_prefix_and_gid() {
        assert_eq!(
            CAA_PROJECT.bucket_name("16ebbc86-670c-4ad3-980b-bfbd1eee4ff4"),
            "mbid-16ebbc86-670c-4ad3-980b-bfbd1eee4ff4"
        );
    }
}
