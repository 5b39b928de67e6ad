//! Object storage for finished collages.
//!
//! The compositor publishes through the [`ObjectStorage`] trait so the
//! service can target Supabase Storage in production and a local directory
//! in development and tests.
//!
//! Objects are written under `{owner_id}/collage-{owner_id}-{millis}.{ext}`
//! and are never overwritten: a second write to the same path fails with
//! [`StorageError::AlreadyExists`].

pub mod local;
pub mod supabase;

use crate::error::{CollageError, StorageError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub use local::LocalStorage;
pub use supabase::SupabaseStorage;

/// Characters allowed in an owner identifier used as a path segment.
static OWNER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

/// Capability to persist bytes and hand out retrievable locations.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Write `bytes` at `path`. Must fail if an object already exists there.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Publicly retrievable location of `path`.
    fn public_url(&self, path: &str) -> String;

    /// Time-limited location of `path`, valid for `ttl_secs`.
    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError>;
}

/// Storage path for a collage rendered at `millis` (Unix epoch milliseconds).
pub fn collage_object_path(owner_id: &str, millis: i64, extension: &str) -> String {
    format!("{owner_id}/collage-{owner_id}-{millis}.{extension}")
}

/// Reject owner identifiers that could escape their storage prefix.
pub fn validate_owner_id(owner_id: &str) -> Result<(), CollageError> {
    if OWNER_ID_RE.is_match(owner_id) {
        Ok(())
    } else {
        Err(CollageError::InvalidOwnerId {
            owner_id: owner_id.to_string(),
        })
    }
}

/// Strip trailing slashes from a base URL.
pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_format() {
        assert_eq!(
            collage_object_path("m1", 1_700_000_000_123, "jpg"),
            "m1/collage-m1-1700000000123.jpg"
        );
    }

    #[test]
    fn owner_id_validation() {
        for ok in ["m1", "abc_DEF-123", "550e8400-e29b-41d4-a716-446655440000"] {
            assert!(validate_owner_id(ok).is_ok(), "{ok} should be accepted");
        }
        let too_long = "a".repeat(129);
        for bad in ["", "../etc", "a/b", "a b", "m1?x=1", "é", too_long.as_str()] {
            assert!(
                matches!(
                    validate_owner_id(bad),
                    Err(CollageError::InvalidOwnerId { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn trims_trailing_slashes() {
        assert_eq!(trim_base("https://x.supabase.co/"), "https://x.supabase.co");
        assert_eq!(trim_base("http://cdn"), "http://cdn");
    }
}
