//! Build manifest (`.build.json`) for incremental builds.
//!
//! Maps every output path, relative to the output root and `/`-separated,
//! to the source it was produced from and that source's SHA-256.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use lakeexport_shared::{LakeExportError, Result};

/// Manifest file name under the output root.
pub const MANIFEST_FILE_NAME: &str = ".build.json";

/// Source of one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: String,
    pub sha256: String,
}

/// All outputs of a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildManifest {
    pub outputs: BTreeMap<String, ManifestEntry>,
}

impl BuildManifest {
    /// Load the manifest from `output_dir`. Missing or unreadable manifests
    /// are empty, which makes the next build convert everything.
    pub fn load(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join(MANIFEST_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(LakeExportError::io(&path, e)),
        };

        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable build manifest");
            Self::default()
        }))
    }

    pub fn save(&self, output_dir: &Path) -> Result<()> {
        let path = output_dir.join(MANIFEST_FILE_NAME);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LakeExportError::parse(format!("serialize build manifest: {e}")))?;
        std::fs::create_dir_all(output_dir).map_err(|e| LakeExportError::io(output_dir, e))?;
        std::fs::write(&path, content).map_err(|e| LakeExportError::io(&path, e))
    }

    /// Whether `output` was last produced from a source with `sha256`.
    pub fn is_current(&self, output: &str, sha256: &str) -> bool {
        self.outputs
            .get(output)
            .is_some_and(|entry| entry.sha256 == sha256)
    }

    /// Outputs recorded here but absent from `next`, sorted.
    pub fn stale_outputs<'a>(&'a self, next: &BuildManifest) -> Vec<&'a str> {
        self.outputs
            .keys()
            .filter(|output| !next.outputs.contains_key(*output))
            .map(String::as_str)
            .collect()
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sha: &str) -> ManifestEntry {
        ManifestEntry {
            source: "src.json".into(),
            sha256: sha.into(),
        }
    }

    #[test]
    fn sha256_is_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stale_outputs_are_the_difference() {
        let mut old = BuildManifest::default();
        old.outputs.insert("a/x.md".into(), entry("1"));
        old.outputs.insert("a/y.md".into(), entry("2"));

        let mut next = BuildManifest::default();
        next.outputs.insert("a/x.md".into(), entry("1"));
        next.outputs.insert("a/z.md".into(), entry("3"));

        assert_eq!(old.stale_outputs(&next), vec!["a/y.md"]);
        assert!(old.is_current("a/x.md", "1"));
        assert!(!old.is_current("a/x.md", "9"));
        assert!(!old.is_current("a/z.md", "3"));
    }

    #[test]
    fn load_save_and_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(BuildManifest::load(tmp.path()).unwrap().outputs.is_empty());

        let mut manifest = BuildManifest::default();
        manifest.outputs.insert("a/x.md".into(), entry("1"));
        manifest.save(tmp.path()).unwrap();
        assert_eq!(BuildManifest::load(tmp.path()).unwrap().outputs.len(), 1);

        std::fs::write(tmp.path().join(MANIFEST_FILE_NAME), "[oops").unwrap();
        assert!(BuildManifest::load(tmp.path()).unwrap().outputs.is_empty());
    }
}
