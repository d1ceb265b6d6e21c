use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;
use walkdir::WalkDir;

use crate::database::recorder::DEFAULT_BATCH_THRESHOLD;

pub const DEFAULT_ROOT: &str = "/Game/";
pub const DEFAULT_DB_PATH: &str = "data/game_content.db";
pub const DEFAULT_SLICE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Project `Content` directory. Found next to a `.uproject` when unset.
    pub content_dir: Option<PathBuf>,
    /// JSON dump of records exported from the editor; used instead of
    /// `content_dir` when set.
    pub manifest: Option<PathBuf>,
    pub root: String,
    pub db_path: PathBuf,
    pub batch_threshold: usize,
    pub slice_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            content_dir: None,
            manifest: None,
            root: DEFAULT_ROOT.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            slice_size: DEFAULT_SLICE_SIZE,
        }
    }
}

impl ScanConfig {
    /// Defaults, overlaid with whatever the env file at `path` sets.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if path.exists() {
            load_from_env(path, &mut config)?;
            info!("Loaded scan settings from {:?}", path);
        }
        Ok(config)
    }

    /// Returns the configured content directory, searching the filesystem
    /// for a project when none is set.
    pub fn resolve_content_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.content_dir {
            return Ok(dir.clone());
        }
        info!("No content directory configured. Searching for a .uproject...");
        let root = std::env::current_dir()?;
        find_project_content(&root, 3)
    }
}

/// Looks for a `.uproject` under `start` (then under its parent) and returns
/// the `Content` directory beside it.
pub fn find_project_content(start: &Path, max_depth: usize) -> Result<PathBuf> {
    let mut roots = vec![start];
    if let Some(parent) = start.parent() {
        roots.push(parent);
    }

    for root in roots {
        let found = WalkDir::new(root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "uproject").unwrap_or(false))
            .filter_map(|e| e.path().parent().map(|p| p.join("Content")))
            .find(|content| content.is_dir());

        if let Some(content) = found {
            info!("Found project content: {:?}", content);
            return Ok(content);
        }
    }

    Err(anyhow!("Could not find a .uproject with a Content directory near {:?}", start))
}

fn load_from_env(path: &Path, config: &mut ScanConfig) -> Result<()> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "CONTENT_DIR" => config.content_dir = Some(PathBuf::from(value)),
            "MANIFEST_PATH" => config.manifest = Some(PathBuf::from(value)),
            "SCAN_ROOT" => config.root = value.to_string(),
            "DB_PATH" => config.db_path = PathBuf::from(value),
            "BATCH_THRESHOLD" => {
                config.batch_threshold = value
                    .parse()
                    .with_context(|| format!("Invalid BATCH_THRESHOLD: {}", value))?
            }
            "SLICE_SIZE" => {
                config.slice_size = value
                    .parse()
                    .with_context(|| format!("Invalid SLICE_SIZE: {}", value))?
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn save_to_env(path: &Path, config: &ScanConfig) -> Result<()> {
    let mut file = File::create(path).context("Failed to create env file")?;
    if let Some(dir) = &config.content_dir {
        writeln!(file, "CONTENT_DIR={}", dir.display())?;
    }
    if let Some(manifest) = &config.manifest {
        writeln!(file, "MANIFEST_PATH={}", manifest.display())?;
    }
    writeln!(file, "SCAN_ROOT={}", config.root)?;
    writeln!(file, "DB_PATH={}", config.db_path.display())?;
    writeln!(file, "BATCH_THRESHOLD={}", config.batch_threshold)?;
    writeln!(file, "SLICE_SIZE={}", config.slice_size)?;
    Ok(())
}

/// Creates the database's parent directory if it is missing.
pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
    }
    Ok(())
}
