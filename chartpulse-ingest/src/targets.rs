//! Artist target list
//!
//! ```toml
//! [[artists]]
//! id = "artist-123"
//! [artists.handles]
//! streaming = "4Z8W4fKeB5YxbusRsdQVPb"
//! short_video = "@someartist"
//! ```
//!
//! Handle keys are provider ids from the main configuration.

use chartpulse_common::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One artist to ingest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtistTarget {
    #[serde(rename = "id")]
    pub artist_id: String,
    /// Provider id → the artist's handle at that provider
    #[serde(default)]
    pub handles: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TargetsFile {
    #[serde(default)]
    artists: Vec<ArtistTarget>,
}

/// Parse and validate a targets document
pub fn parse_targets(content: &str) -> Result<Vec<ArtistTarget>> {
    let file: TargetsFile = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse targets failed: {}", e)))?;

    let mut seen = HashSet::new();
    for target in &file.artists {
        if target.artist_id.trim().is_empty() {
            return Err(Error::InvalidInput("artist id must not be empty".to_string()));
        }
        if !seen.insert(target.artist_id.as_str()) {
            return Err(Error::InvalidInput(format!(
                "artist {} listed more than once",
                target.artist_id
            )));
        }
    }

    Ok(file.artists)
}

/// Load targets from a TOML file
pub fn load_targets(path: &Path) -> Result<Vec<ArtistTarget>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read targets {}: {}", path.display(), e))
    })?;
    parse_targets(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        let targets = parse_targets(
            r#"
            [[artists]]
            id = "artist-1"
            [artists.handles]
            streaming = "abc"
            short_video = "@one"

            [[artists]]
            id = "artist-2"
            "#,
        )
        .unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].handles["short_video"], "@one");
        assert!(targets[1].handles.is_empty());
    }

    #[test]
    fn test_duplicate_artist_rejected() {
        let err = parse_targets(
            "[[artists]]\nid = \"a\"\n[[artists]]\nid = \"a\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_document_has_no_targets() {
        assert!(parse_targets("").unwrap().is_empty());
    }

    #[test]
    fn test_load_targets_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("artists.toml");
        std::fs::write(&path, "[[artists]]\nid = \"artist-9\"\n").unwrap();

        let targets = load_targets(&path).unwrap();
        assert_eq!(targets[0].artist_id, "artist-9");

        let missing = load_targets(&temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
