//! Source resolution: accept a bare `.mff` bundle or a `.tar`/`.zip` archive
//! of one, and hand back the directory the MFF reader should open.
//!
//! Archives are unpacked into a working directory (the caller's, or a scoped
//! temporary one created by [`crate::convert`]) and searched for the folder
//! holding a `Contents` entry — the shape EGI's export tools produce.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

/// Extensions we know how to open.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["tar", "zip", "mff"];

/// Resolve `source` to the directory containing the MFF bundle.
///
/// * `.mff` — returned unchanged (no copy, no extraction).
/// * `.tar` / `.zip` — unpacked into `workdir`, then the first directory
///   containing a `Contents` entry (searched depth-first, `workdir` itself
///   included) is returned.
///
/// # Errors
///
/// Fails when the extension is not one of [`SUPPORTED_EXTENSIONS`], when the
/// archive cannot be read, or when no `Contents` folder exists after
/// extraction.
pub fn resolve_source(source: &Path, workdir: &Path) -> Result<PathBuf> {
    if !source.exists() {
        bail!("source path does not exist: {}", source.display());
    }
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "mff" => Ok(source.to_path_buf()),
        "tar" => {
            info!("extracting '.tar' archive {} to {}", source.display(), workdir.display());
            let file = File::open(source)
                .with_context(|| format!("open {}", source.display()))?;
            tar::Archive::new(file)
                .unpack(workdir)
                .with_context(|| format!("unpack tar archive {}", source.display()))?;
            find_contents_root(workdir, &ext)
        }
        "zip" => {
            info!("extracting '.zip' archive {} to {}", source.display(), workdir.display());
            let file = File::open(source)
                .with_context(|| format!("open {}", source.display()))?;
            zip::ZipArchive::new(file)
                .with_context(|| format!("read zip archive {}", source.display()))?
                .extract(workdir)
                .with_context(|| format!("unpack zip archive {}", source.display()))?;
            find_contents_root(workdir, &ext)
        }
        other => bail!(
            "unsupported extension '.{other}' for {}; expected one of .tar, .zip, .mff",
            source.display()
        ),
    }
}

/// Depth-first search for a directory that has a `Contents` child.
fn find_contents_root(dir: &Path, ext: &str) -> Result<PathBuf> {
    if let Some(root) = walk_for_contents(dir)? {
        info!("MFF bundle found in {}", root.display());
        return Ok(root);
    }
    bail!("the '.{ext}' archive does not contain a 'Contents' folder");
}

fn walk_for_contents(dir: &Path) -> Result<Option<PathBuf>> {
    if dir.join("Contents").is_dir() {
        return Ok(Some(dir.to_path_buf()));
    }
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            if let Some(found) = walk_for_contents(&path)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}
