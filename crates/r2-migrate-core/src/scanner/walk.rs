use super::mime;
use crate::error::Error;
use crate::hasher;
use crate::models::FileAsset;
use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Parallel directory traversal. Builds a `FileAsset` for every supported
/// image/video file under `root_paths`, keyed relative to `public_dir`.
/// Skips symlinks and anything matching an ignore glob.
///
/// The result is sorted by remote key. A root that is missing or unreadable
/// fails the whole call.
pub fn discover_assets(
    root_paths: &[PathBuf],
    public_dir: &Path,
    ignore_globs: &[&str],
) -> Result<Vec<FileAsset>, Error> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let public_dir = fs::canonicalize(public_dir).map_err(|e| Error::Discovery {
        path: public_dir.to_path_buf(),
        reason: format!("public directory is not accessible: {}", e),
    })?;

    let roots = root_paths
        .iter()
        .map(|root| open_root(root))
        .collect::<Result<Vec<_>, _>>()?;

    let map: DashMap<String, FileAsset> = DashMap::new();

    roots
        .par_iter()
        .try_for_each(|root| visit_dirs(root, &public_dir, &map, &ignore_patterns, true))?;

    let mut assets: Vec<FileAsset> = map.into_iter().map(|(_, asset)| asset).collect();
    assets.sort_by(|a, b| a.remote_key.cmp(&b.remote_key));
    debug!("Discovered {} assets", assets.len());

    Ok(assets)
}

fn open_root(root: &Path) -> Result<PathBuf, Error> {
    let canonical = fs::canonicalize(root).map_err(|e| Error::Discovery {
        path: root.to_path_buf(),
        reason: format!("source directory not found: {}", e),
    })?;
    if !canonical.is_dir() {
        return Err(Error::Discovery {
            path: root.to_path_buf(),
            reason: "source path is not a directory".to_string(),
        });
    }
    Ok(canonical)
}

fn visit_dirs(
    dir: &Path,
    public_dir: &Path,
    map: &DashMap<String, FileAsset>,
    ignore_patterns: &[Pattern],
    is_root: bool,
) -> Result<(), Error> {
    if ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(dir))
    {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if !is_root && err.kind() == io::ErrorKind::PermissionDenied => {
            error!(
                "Access denied reading directory {}: {}",
                dir.display(),
                err
            );
            return Ok(());
        }
        Err(err) => {
            return Err(Error::Discovery {
                path: dir.to_path_buf(),
                reason: format!("error reading directory: {}", err),
            });
        }
    };

    entries.par_bridge().try_for_each(|entry_result| {
        let entry = entry_result.map_err(|err| Error::Discovery {
            path: dir.to_path_buf(),
            reason: format!("error reading directory entry: {}", err),
        })?;

        let path = entry.path();
        let file_type = entry.file_type().map_err(|err| Error::Discovery {
            path: path.clone(),
            reason: format!("error getting file type: {}", err),
        })?;

        if file_type.is_dir() {
            visit_dirs(&path, public_dir, map, ignore_patterns, false)?;
        } else if file_type.is_file()
            && mime::is_supported(&path)
            && !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(&path))
        {
            let asset = build_asset(&path, public_dir)?;
            map.insert(asset.remote_key.clone(), asset);
        }
        Ok(())
    })
}

/// Remote key for `path`: its components below `public_dir`, joined with `/`.
pub fn remote_key_for(path: &Path, public_dir: &Path) -> Result<String, Error> {
    let relative = path.strip_prefix(public_dir).map_err(|_| Error::Discovery {
        path: path.to_path_buf(),
        reason: format!("file is outside public directory {}", public_dir.display()),
    })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn build_asset(path: &Path, public_dir: &Path) -> Result<FileAsset, Error> {
    let metadata = fs::metadata(path).map_err(|err| Error::Discovery {
        path: path.to_path_buf(),
        reason: format!("error getting metadata: {}", err),
    })?;

    let category = mime::category_for(path).ok_or_else(|| Error::Discovery {
        path: path.to_path_buf(),
        reason: "unsupported file type".to_string(),
    })?;

    Ok(FileAsset {
        local_path: path.to_path_buf(),
        remote_key: remote_key_for(path, public_dir)?,
        size_bytes: metadata.len(),
        mime_type: mime::content_type_for(path).to_string(),
        checksum: hasher::hash_file(path)?,
        category,
    })
}
