use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use crate::database::repo::AssetRecord;

/// Where asset paths and their metadata come from.
///
/// Inside the editor this wraps the asset registry; outside it, a content
/// directory or a metadata dump exported by the editor.
pub trait AssetSource {
    /// Every asset under `root`, recursively, in a stable order.
    fn list_asset_paths(&self, root: &str) -> Result<Vec<String>>;

    /// Metadata for one listed path, or `None` if the source has nothing
    /// for it.
    fn metadata(&self, path: &str) -> Result<Option<AssetRecord>>;
}

impl<T: AssetSource + ?Sized> AssetSource for Box<T> {
    fn list_asset_paths(&self, root: &str) -> Result<Vec<String>> {
        (**self).list_asset_paths(root)
    }

    fn metadata(&self, path: &str) -> Result<Option<AssetRecord>> {
        (**self).metadata(path)
    }
}

/// Returns true if `package` is `root` or lies beneath it.
pub fn is_under_root(package: &str, root: &str) -> bool {
    let prefix = root.trim_end_matches('/');
    package == prefix
        || package
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Strips the object name from an object path: `/Game/A/B.B` -> `/Game/A/B`.
///
/// Only the last segment is inspected, so dotted folders survive. A segment
/// of the form `X.X` yields `X` even when `X` itself contains dots.
pub fn package_name(path: &str) -> &str {
    let start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[start..];

    let half = segment.len() / 2;
    if segment.len() % 2 == 1
        && segment.as_bytes()[half] == b'.'
        && segment[..half] == segment[half + 1..]
    {
        return &path[..start + half];
    }

    match segment.find('.') {
        Some(dot) => &path[..start + dot],
        None => path,
    }
}

/// Records already extracted elsewhere, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: BTreeMap<String, AssetRecord>,
}

impl StaticSource {
    /// Later records with the same package name replace earlier ones.
    pub fn new(records: impl IntoIterator<Item = AssetRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.ue_file_path.clone(), r))
            .collect();
        Self { records }
    }

    /// Reads a JSON array of records.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let records: Vec<AssetRecord> =
            serde_json::from_reader(reader).context("Failed to parse asset manifest")?;
        Ok(Self::new(records))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open asset manifest: {:?}", path))?;
        Self::from_json_reader(BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AssetSource for StaticSource {
    fn list_asset_paths(&self, root: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .keys()
            .filter(|p| is_under_root(p, root))
            .cloned()
            .collect())
    }

    fn metadata(&self, path: &str) -> Result<Option<AssetRecord>> {
        Ok(self.records.get(package_name(path)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repo::sample_record;

    #[test]
    fn test_root_matching() {
        assert!(is_under_root("/Game/Props/SM_Chair", "/Game/"));
        assert!(is_under_root("/Game/Props/SM_Chair", "/Game/Props"));
        assert!(is_under_root("/Game/Props", "/Game/Props/"));
        assert!(!is_under_root("/Game/PropsOld/SM_Chair", "/Game/Props"));
        assert!(!is_under_root("/Engine/Basic", "/Game/"));
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("/Game/A/SM_B.SM_B"), "/Game/A/SM_B");
        assert_eq!(package_name("/Game/A/SM_B"), "/Game/A/SM_B");
        assert_eq!(package_name("/Game/A/SM_B.Other"), "/Game/A/SM_B");
    }

    #[test]
    fn test_package_name_with_dotted_segments() {
        assert_eq!(package_name("/Game/v1.2/SM_A.SM_A"), "/Game/v1.2/SM_A");
        assert_eq!(package_name("/Game/v1.2/SM_B"), "/Game/v1.2/SM_B");
        assert_eq!(package_name("/Game/v1.2/SM_A.v2.SM_A.v2"), "/Game/v1.2/SM_A.v2");
    }

    #[test]
    fn test_static_source_lists_and_looks_up() -> Result<()> {
        let source = StaticSource::new(vec![
            sample_record("/Game/Props/SM_Chair"),
            sample_record("/Game/Maps/Level"),
            sample_record("/Game/Props/SM_Table"),
        ]);

        let props = source.list_asset_paths("/Game/Props/")?;
        assert_eq!(props, vec!["/Game/Props/SM_Chair", "/Game/Props/SM_Table"]);

        let found = source.metadata("/Game/Maps/Level.Level")?;
        assert_eq!(found.map(|r| r.asset_name), Some("Level".to_string()));
        assert!(source.metadata("/Game/Missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_manifest_parsing_fills_defaults() -> Result<()> {
        let json = r#"[
            {
                "asset_name": "M_Base",
                "asset_class": "Material",
                "asset_class_path": "/Script/Engine",
                "ue_file_path": "/Game/Materials/M_Base",
                "referencers": ["/Game/Props/SM_Chair"],
                "is_valid": true
            }
        ]"#;
        let source = StaticSource::from_json_reader(json.as_bytes())?;
        assert_eq!(source.len(), 1);

        let record = source
            .metadata("/Game/Materials/M_Base")?
            .ok_or_else(|| anyhow::anyhow!("record missing"))?;
        assert!(record.dependencies.is_empty());
        assert_eq!(record.referencers, vec!["/Game/Props/SM_Chair"]);
        assert_eq!(record.file_size_mb, 0.0);
        assert!(record.is_valid);
        assert!(!record.is_redirector);
        Ok(())
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        assert!(StaticSource::from_json_reader("{not json".as_bytes()).is_err());
    }
}
