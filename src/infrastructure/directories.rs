use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::{DirectoryConfig, PageConfig};

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub snapshot_path: PathBuf,
}

pub fn ensure_directories(dirs: &DirectoryConfig, page: &PageConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&dirs.logs_dir)?;
    let data_dir = ensure_dir(&dirs.data_dir)?;
    let db_path = data_dir.join(&dirs.db_filename);

    let marker = data_dir.join(".write-test");
    fs::write(&marker, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&marker)?;

    let snapshot_path = resolve_under(&data_dir, &page.snapshot_path);
    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        db_path,
        snapshot_path,
    })
}

/// Relative paths are taken relative to `base`; absolute ones are kept.
fn resolve_under(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(&dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o755);
            let _ = fs::set_permissions(&dir, perms);
        }
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}
