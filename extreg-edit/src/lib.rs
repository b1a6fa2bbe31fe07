//! Patch rules for registering an extension in scratch-vm / scratch-gui
//! sources.
//!
//! Responsibilities:
//! - Pure string-in/string-out transforms for every textual patch rule
//!   (URL substitution, manager table, core list, GUI index, dev-server
//!   follow-symlinks).
//! - Apply a transform to a file on disk with a lazy `.orig` backup
//!   (read-check-backup-write).
//!
//! The transforms never touch the file system, so every rule is testable
//! against plain strings; `apply_registration` / `apply_url_substitution`
//! are the only functions here that do I/O.

mod error;

pub use error::{EditError, EditResult};

use std::sync::LazyLock;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use regex::{NoExpand, Regex};
use tracing::debug;

static ENTRY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"extensionURL:\s*[^,]+,").expect("valid entry url regex"));
static BLOCK_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"let\s+extensionURL\s+=\s+[^;]+;").expect("valid block url regex")
});
static BUILTIN_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)builtinExtensions = \{.*?\};").expect("valid builtin table regex")
});
static CORE_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)CORE_EXTENSIONS = \[.*?\];").expect("valid core list regex")
});
static IMMUTABLE_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+default\s+\[").expect("valid default export regex")
});
static DEV_SERVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"devServer:\s*\{").expect("valid dev server regex"));

/// Result of an idempotent registration transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The marker was inserted; the full new file contents are returned.
    Changed(String),
    /// The marker is already present; the file must not be touched.
    AlreadyPresent,
}

/// What the applicator did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// The file was rewritten (backed up first when a registration edit).
    Applied,
    /// Nothing matched or the edit was already in place; the file is intact.
    Skipped,
}

/// Rewrite the first `extensionURL: <value>,` assignment in GUI entry code.
///
/// Returns `None` when no assignment matches; the caller leaves the file
/// untouched in that case.
pub fn substitute_entry_url(code: &str, url: &str) -> Option<String> {
    let replacement = format!("extensionURL: '{url}',");
    match ENTRY_URL_RE.replace(code, NoExpand(&replacement)) {
        std::borrow::Cow::Borrowed(_) => None,
        std::borrow::Cow::Owned(new_code) => Some(new_code),
    }
}

/// Rewrite the first `let extensionURL = <value>;` assignment in block code.
pub fn substitute_block_url(code: &str, url: &str) -> Option<String> {
    let replacement = format!("let extensionURL = '{url}';");
    match BLOCK_URL_RE.replace(code, NoExpand(&replacement)) {
        std::borrow::Cow::Borrowed(_) => None,
        std::borrow::Cow::Owned(new_code) => Some(new_code),
    }
}

/// Register the extension in the VM extension-manager builtin table.
///
/// Appends a factory entry directly after the `builtinExtensions = {...};`
/// literal, requiring the extension module at `../extensions/<dir_name>`.
pub fn register_in_manager(code: &str, id: &str, dir_name: &str) -> EditResult<RegisterOutcome> {
    if code.contains(&format!("builtinExtensions.{id}")) {
        return Ok(RegisterOutcome::AlreadyPresent);
    }
    let table = BUILTIN_TABLE_RE
        .find(code)
        .ok_or(EditError::AnchorNotFound {
            anchor: "builtinExtensions = {...};",
        })?;
    let entry = format!(
        "\n\nbuiltinExtensions.{id} = () => {{\n    \
         const ext = require('../extensions/{dir_name}');\n    \
         return ext.default ? ext.default : ext;\n}};"
    );
    Ok(RegisterOutcome::Changed(splice_after(
        code,
        table.end(),
        &entry,
    )))
}

/// Register the extension id in the VM core-extension list.
pub fn register_as_core(code: &str, id: &str) -> EditResult<RegisterOutcome> {
    if code.contains(&format!("CORE_EXTENSIONS.push('{id}')")) {
        return Ok(RegisterOutcome::AlreadyPresent);
    }
    let list = CORE_LIST_RE.find(code).ok_or(EditError::AnchorNotFound {
        anchor: "CORE_EXTENSIONS = [...];",
    })?;
    let entry = format!("\n\nCORE_EXTENSIONS.push('{id}');");
    Ok(RegisterOutcome::Changed(splice_after(
        code,
        list.end(),
        &entry,
    )))
}

/// Register the extension in the GUI extension index.
///
/// When the index still exports an immutable literal list
/// (`export default [...]`), that export is first rewritten into a named
/// mutable binding plus a re-export; the rewrite happens at most once across
/// repeated runs because a registered id short-circuits before it. The
/// import, the `unshift` call, and a marker comment identifying the injected
/// block are then appended.
pub fn register_in_gui_index(code: &str, id: &str, dir_name: &str) -> EditResult<RegisterOutcome> {
    if code.contains(&format!("import {id}")) {
        return Ok(RegisterOutcome::AlreadyPresent);
    }
    let mut new_code = match IMMUTABLE_DEFAULT_RE.find(code) {
        Some(export) => {
            let mut rewritten = String::with_capacity(code.len() + 128);
            rewritten.push_str(&code[..export.start()]);
            rewritten.push_str("const extensions = [");
            rewritten.push_str(&code[export.end()..]);
            rewritten.push_str("\nexport default extensions;");
            rewritten
        }
        None => code.to_string(),
    };
    new_code.push_str(&format!("\n// Injected for extra extension {id}"));
    new_code.push_str(&format!("\nimport {id} from './{dir_name}/index.jsx';"));
    new_code.push_str(&format!("\nextensions.unshift({id});"));
    new_code.push('\n');
    Ok(RegisterOutcome::Changed(new_code))
}

/// Enable symlink following in the GUI dev-server configuration.
///
/// Inserts `followSymlinks: true,` directly after the first `devServer: {`
/// so webpack-dev-server resolves linked extension sources.
pub fn enable_follow_symlinks(code: &str) -> EditResult<RegisterOutcome> {
    if code.contains("followSymlinks: true") {
        return Ok(RegisterOutcome::AlreadyPresent);
    }
    let block = DEV_SERVER_RE.find(code).ok_or(EditError::AnchorNotFound {
        anchor: "devServer: {",
    })?;
    Ok(RegisterOutcome::Changed(splice_after(
        code,
        block.end(),
        "\n        followSymlinks: true,",
    )))
}

fn splice_after(code: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(code.len() + insert.len());
    out.push_str(&code[..at]);
    out.push_str(insert);
    out.push_str(&code[at..]);
    out
}

/// Copy `path` to `<path>.orig` unless a backup already exists.
///
/// The first modification wins; repeated runs must not overwrite the
/// original snapshot.
pub fn ensure_backup(path: &Utf8Path) -> anyhow::Result<()> {
    let backup = Utf8PathBuf::from(format!("{path}.orig"));
    if backup.exists() {
        debug!("backup already present: {}", backup);
        return Ok(());
    }
    fs::copy(path, &backup).with_context(|| format!("back up {path} to {backup}"))?;
    Ok(())
}

/// Apply an idempotent registration transform to `path`.
///
/// On `Changed` the file is backed up (lazily) and rewritten; on
/// `AlreadyPresent` nothing is touched. Read/write errors propagate with
/// path context and no rollback; the `.orig` backup is the only recovery
/// aid.
pub fn apply_registration<F>(path: &Utf8Path, transform: F) -> anyhow::Result<ApplyStatus>
where
    F: FnOnce(&str) -> EditResult<RegisterOutcome>,
{
    let code = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    match transform(&code).with_context(|| format!("patch {path}"))? {
        RegisterOutcome::AlreadyPresent => Ok(ApplyStatus::Skipped),
        RegisterOutcome::Changed(new_code) => {
            ensure_backup(path)?;
            fs::write(path, new_code).with_context(|| format!("write {path}"))?;
            Ok(ApplyStatus::Applied)
        }
    }
}

/// Apply a URL substitution to `path`.
///
/// A file without a matching assignment is left byte-identical (silent
/// no-op), and no backup is taken either way.
pub fn apply_url_substitution<F>(path: &Utf8Path, substitute: F) -> anyhow::Result<ApplyStatus>
where
    F: FnOnce(&str) -> Option<String>,
{
    let code = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    match substitute(&code) {
        None => Ok(ApplyStatus::Skipped),
        Some(new_code) => {
            fs::write(path, new_code).with_context(|| format!("write {path}"))?;
            Ok(ApplyStatus::Applied)
        }
    }
}
