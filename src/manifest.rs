//! Overlay Manifests
//!
//! Loads an overlay file set from a JSON, YAML or TOML document:
//!
//! ```toml
//! base_dir = "/srv/app"
//!
//! [files]
//! "/etc/app.conf" = "port = 8080"
//! "/data/blob.bin" = { content = "AAEC", encoding = "base64" }
//! ```

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::fs::{DynamicFs, DynamicFsOptions, FileContent, FileSystem, InitialFiles, LoadError};

/// Encoding of an entry's `content` string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEncoding {
    #[default]
    Utf8,
    Base64,
}

/// A single file in a manifest: plain text, or content with an encoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Text(String),
    Encoded {
        content: String,
        #[serde(default)]
        encoding: FileEncoding,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
    Toml,
}

impl ManifestFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(LoadError::UnknownFormat(path.display().to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Directory `.`-prefixed paths are resolved against
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Overlay files in document order
    #[serde(default)]
    pub files: IndexMap<String, ManifestEntry>,
}

impl Manifest {
    /// Read and parse a manifest file, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let format = ManifestFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let manifest = Self::parse(&text, format)?;
        tracing::debug!(path = %path.display(), files = manifest.files.len(), "manifest loaded");
        Ok(manifest)
    }

    pub fn parse(text: &str, format: ManifestFormat) -> Result<Self, LoadError> {
        let parse_error = |message: String| LoadError::Parse {
            format: format.name(),
            message,
        };
        match format {
            ManifestFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
            ManifestFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string())),
            ManifestFormat::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Layer `other` on top of this manifest. Its files win on conflicts and
    /// its base directory, when set, replaces this one.
    pub fn merge(&mut self, other: Manifest) {
        if other.base_dir.is_some() {
            self.base_dir = other.base_dir;
        }
        for (path, entry) in other.files {
            self.files.shift_remove(&path);
            self.files.insert(path, entry);
        }
    }

    /// Decode every entry into overlay file content.
    pub fn into_files(self) -> Result<InitialFiles, LoadError> {
        let mut files = InitialFiles::with_capacity(self.files.len());
        for (path, entry) in self.files {
            let content = match entry {
                ManifestEntry::Text(text) => FileContent::Text(text),
                ManifestEntry::Encoded { content, encoding: FileEncoding::Utf8 } => {
                    FileContent::Text(content)
                }
                ManifestEntry::Encoded { content, encoding: FileEncoding::Base64 } => {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(content.trim())
                        .map_err(|e| LoadError::InvalidContent {
                            path: path.clone(),
                            message: format!("base64 decode error: {}", e),
                        })?;
                    FileContent::Binary(bytes)
                }
            };
            files.insert(path, content);
        }
        Ok(files)
    }

    /// Build an overlay from this manifest over `host` (or the real filesystem).
    pub fn build(self, host: Option<Arc<dyn FileSystem>>) -> Result<DynamicFs, LoadError> {
        let base_dir = self.base_dir.clone();
        let files = self.into_files()?;
        DynamicFs::with_options(files, DynamicFsOptions { base_dir, host })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileData, ReadOptions};

    #[test]
    fn test_parse_json() {
        let manifest = Manifest::parse(
            r#"{
                "files": {
                    "/a/b.txt": "hello",
                    "/a/c.bin": { "content": "AAEC", "encoding": "base64" }
                }
            }"#,
            ManifestFormat::Json,
        )
        .unwrap();
        assert_eq!(manifest.base_dir, None);
        assert_eq!(
            manifest.files.get("/a/b.txt"),
            Some(&ManifestEntry::Text("hello".to_string()))
        );

        let files = manifest.into_files().unwrap();
        assert_eq!(files.get("/a/c.bin"), Some(&FileContent::Binary(vec![0, 1, 2])));
    }

    #[test]
    fn test_parse_yaml_preserves_order() {
        let manifest = Manifest::parse(
            "base_dir: /srv\nfiles:\n  /z.txt: last\n  /a.txt:\n    content: first\n",
            ManifestFormat::Yaml,
        )
        .unwrap();
        assert_eq!(manifest.base_dir.as_deref(), Some("/srv"));
        let keys: Vec<&str> = manifest.files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["/z.txt", "/a.txt"]);
        assert_eq!(
            manifest.files["/a.txt"],
            ManifestEntry::Encoded { content: "first".to_string(), encoding: FileEncoding::Utf8 }
        );
    }

    #[test]
    fn test_parse_toml() {
        let manifest = Manifest::parse(
            "[files]\n\"/etc/app.conf\" = \"port = 8080\"\n",
            ManifestFormat::Toml,
        )
        .unwrap();
        assert_eq!(
            manifest.files["/etc/app.conf"],
            ManifestEntry::Text("port = 8080".to_string())
        );
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = Manifest::parse("{ not json", ManifestFormat::Json).unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON manifest"));
    }

    #[test]
    fn test_invalid_base64() {
        let manifest = Manifest::parse(
            r#"{ "files": { "/x": { "content": "!!!", "encoding": "base64" } } }"#,
            ManifestFormat::Json,
        )
        .unwrap();
        let err = manifest.into_files().unwrap_err();
        assert!(matches!(err, LoadError::InvalidContent { ref path, .. } if path == "/x"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ManifestFormat::from_path(Path::new("a.JSON")).unwrap(), ManifestFormat::Json);
        assert_eq!(ManifestFormat::from_path(Path::new("a.yml")).unwrap(), ManifestFormat::Yaml);
        assert!(matches!(
            ManifestFormat::from_path(Path::new("a.ini")),
            Err(LoadError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut base = Manifest::parse(
            r#"{ "files": { "/a": "one", "/b": "two" } }"#,
            ManifestFormat::Json,
        )
        .unwrap();
        let top = Manifest::parse(
            r#"{ "base_dir": "/top", "files": { "/a": "three" } }"#,
            ManifestFormat::Json,
        )
        .unwrap();
        base.merge(top);
        assert_eq!(base.base_dir.as_deref(), Some("/top"));
        assert_eq!(base.files["/a"], ManifestEntry::Text("three".to_string()));
        assert_eq!(base.files.len(), 2);
    }

    #[test]
    fn test_load_and_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.json");
        std::fs::write(&path, r#"{ "files": { "/virtual/hello.txt": "hi" } }"#).unwrap();

        let fs = Manifest::load(&path).unwrap().build(None).unwrap();
        assert_eq!(
            fs.read_file_sync("/virtual/hello.txt", &"utf8".parse::<ReadOptions>().unwrap())
                .unwrap(),
            FileData::Text("hi".to_string())
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
