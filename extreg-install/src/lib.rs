//! File-system installation strategies for extension sources.
//!
//! Responsibilities:
//! - Idempotent directory symlinks, with a rename-aside policy for whatever
//!   currently occupies the link path.
//! - Copy-mode installation: move an existing target aside (`<dir>~`) and
//!   copy the source tree recursively.

use std::io;
use std::path::Path;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::symlink as symlink_dir;
#[cfg(windows)]
use std::os::windows::fs::symlink_dir;

/// What `ensure_symlink` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// A new symlink was created (possibly after clearing the link path).
    Created,
    /// A symlink with the right target was already in place.
    AlreadyLinked,
}

/// Create a directory symlink at `link` pointing to `target`.
///
/// Policy for an existing `link` path:
/// - a symlink already pointing at `target`: no-op;
/// - a symlink pointing elsewhere: removed and recreated;
/// - a real file or directory: renamed aside to `<link>~`;
/// - nothing there: the lstat failure is swallowed and the link is created.
pub fn ensure_symlink(target: &Utf8Path, link: &Utf8Path) -> anyhow::Result<LinkStatus> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let dest = fs::read_link(link).with_context(|| format!("read link {link}"))?;
            if dest == target.as_std_path() {
                info!("Already exists link: {} -> {}", link, dest.display());
                return Ok(LinkStatus::AlreadyLinked);
            }
            fs::remove_file(link).with_context(|| format!("remove stale link {link}"))?;
        }
        Ok(_) => {
            backup_aside(link)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).with_context(|| format!("stat {link}")),
    }
    symlink_dir(target, link).with_context(|| format!("link {link} -> {target}"))?;
    info!("Make link: {} -> {}", link, target);
    Ok(LinkStatus::Created)
}

/// Rename `path` aside to `<path>~`, clearing a stale backup first so the
/// rename cannot fail on a leftover from a previous run.
///
/// Returns the backup path when something was moved, `None` when `path`
/// does not exist.
pub fn backup_aside(path: &Utf8Path) -> anyhow::Result<Option<Utf8PathBuf>> {
    match fs::symlink_metadata(path) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("stat {path}")),
    }

    let backup = Utf8PathBuf::from(format!("{path}~"));
    match fs::symlink_metadata(&backup) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(&backup)
                .with_context(|| format!("clear stale backup {backup}"))?;
        }
        Ok(_) => {
            fs::remove_file(&backup).with_context(|| format!("clear stale backup {backup}"))?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).with_context(|| format!("stat {backup}")),
    }

    fs::rename(path, &backup).with_context(|| format!("move {path} aside to {backup}"))?;
    debug!("moved {} aside to {}", path, backup);
    Ok(Some(backup))
}

/// Recursively copy the tree at `src` into `dest`, creating directories as
/// needed. Files are copied following symlinks, like the copy-mode install
/// of the original checkouts expects.
pub fn copy_dir_recursive(src: &Utf8Path, dest: &Utf8Path) -> anyhow::Result<()> {
    copy_tree(src.as_std_path(), dest.as_std_path())
        .with_context(|| format!("copy dir {src} -> {dest}"))
}

fn copy_tree(src: &Path, dest: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let to = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

/// Copy-mode installation: move any pre-existing `dest` aside as a backup,
/// then copy the `src` tree in.
pub fn install_copy(src: &Utf8Path, dest: &Utf8Path) -> anyhow::Result<()> {
    backup_aside(dest)?;
    copy_dir_recursive(src, dest)?;
    info!("copy dir {} -> {}", src, dest);
    Ok(())
}
