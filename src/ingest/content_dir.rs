use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::database::repo::{bytes_to_mb, AssetRecord};
use crate::ingest::source::{is_under_root, package_name, AssetSource};

const MOUNT_POINT: &str = "/Game";
const ASSET_EXTENSIONS: [&str; 2] = ["uasset", "umap"];

/// Reads assets straight from a project's `Content` directory.
///
/// Package `/Game/Props/SM_Chair` maps to `<content>/Props/SM_Chair.uasset`
/// (or `.umap`). There is no registry on disk, so dependency, referencer
/// and tag data are empty.
#[derive(Debug, Clone)]
pub struct ContentDirSource {
    content_dir: PathBuf,
}

impl ContentDirSource {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Finds the `.uasset` or `.umap` file backing a package.
    pub fn resolve_asset_file(&self, package: &str) -> Option<PathBuf> {
        let relative = package.strip_prefix(MOUNT_POINT)?.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        let mut base = self.content_dir.clone();
        base.extend(relative.split('/'));
        let stem = base.file_name()?.to_os_string();

        // Appended, not `with_extension`, so a dotted stem keeps its dots.
        ASSET_EXTENSIONS
            .iter()
            .map(|ext| {
                let mut name = stem.clone();
                name.push(".");
                name.push(ext);
                base.with_file_name(name)
            })
            .find(|candidate| candidate.is_file())
    }

    fn object_path(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.content_dir).ok()?.with_extension("");
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        let name = parts.last()?;
        Some(format!("{}/{}.{}", MOUNT_POINT, parts.join("/"), name))
    }
}

impl AssetSource for ContentDirSource {
    fn list_asset_paths(&self, root: &str) -> Result<Vec<String>> {
        let walker = WalkDir::new(&self.content_dir).into_iter();
        let mut paths = Vec::new();

        for entry in walker.filter_entry(|e| e.depth() == 0 || !is_hidden(e)) {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_asset_file(entry.path()) {
                continue;
            }
            match self.object_path(entry.path()) {
                Some(path) if is_under_root(package_name(&path), root) => paths.push(path),
                Some(_) => {}
                None => warn!("Skipping non UTF-8 asset path: {:?}", entry.path()),
            }
        }

        paths.sort();
        Ok(paths)
    }

    fn metadata(&self, path: &str) -> Result<Option<AssetRecord>> {
        let package = package_name(path);
        if !is_under_root(package, MOUNT_POINT) {
            return Ok(None);
        }
        let asset_name = package.rsplit('/').next().unwrap_or(package).to_string();

        let file = self.resolve_asset_file(package);
        let (file_size_mb, last_mod_time, disk_file_path) = match &file {
            Some(file) => disk_stats(file),
            None => {
                warn!("File not found for package: {}", package);
                (0.0, String::new(), String::new())
            }
        };
        let is_map = file
            .as_deref()
            .and_then(Path::extension)
            .map(|ext| ext == "umap")
            .unwrap_or(false);

        Ok(Some(AssetRecord {
            asset_name,
            asset_class: if is_map { "World" } else { "Object" }.to_string(),
            asset_class_path: "/Script/Engine".to_string(),
            ue_file_path: package.to_string(),
            dependencies: Vec::new(),
            referencers: Vec::new(),
            tag_values: Default::default(),
            file_size_mb,
            last_mod_time,
            disk_file_path,
            is_asset_loaded: false,
            is_redirector: false,
            is_u_asset: file.is_some(),
            is_valid: file.is_some(),
        }))
    }
}

/// Size in MB, local modification time and forward-slash path, from a
/// single stat.
fn disk_stats(file: &Path) -> (f64, String, String) {
    let disk_path = file.to_string_lossy().replace('\\', "/");
    let meta = match fs::metadata(file) {
        Ok(m) => m,
        Err(e) => {
            error!("Error accessing {:?}: {}", file, e);
            return (0.0, String::new(), String::new());
        }
    };

    let last_mod_time = meta
        .modified()
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    (bytes_to_mb(meta.len()), last_mod_time, disk_path)
}

fn is_asset_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ASSET_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
