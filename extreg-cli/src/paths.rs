//! Path resolution for one extreg invocation.
//!
//! Every path is resolved relative to the working directory or to another
//! already-resolved root. Resolution is purely lexical: most targets do not
//! exist until installation runs, so nothing is canonicalized.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use crate::config::Options;

/// Default GUI checkout, as a sibling of the extension project.
pub const DEFAULT_GUI_DIR: &str = "../scratch-gui";
/// Default VM checkout, inside the GUI's node_modules.
pub const DEFAULT_VM_SUBDIR: &str = "node_modules/scratch-vm";
/// Default local block (VM runtime) source directory.
pub const DEFAULT_BLOCK_DIR: &str = "src/vm/extensions/block";
/// Default local entry (GUI library) source directory.
pub const DEFAULT_ENTRY_DIR: &str = "src/gui/lib/libraries/extensions/entry";

/// The absolute paths one invocation works with.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    /// GUI project root.
    pub gui_root: Utf8PathBuf,
    /// VM project root.
    pub vm_root: Utf8PathBuf,
    /// Local block source directory.
    pub block_src: Utf8PathBuf,
    /// Local entry source directory.
    pub entry_src: Utf8PathBuf,
    /// Installed extension directory in the VM tree.
    pub vm_ext_dir: Utf8PathBuf,
    /// Installed extension directory in the GUI tree.
    pub gui_ext_dir: Utf8PathBuf,
    /// Installed block file (URL substitution target).
    pub block_file: Utf8PathBuf,
    /// Installed entry file (URL substitution target).
    pub entry_file: Utf8PathBuf,
    /// VM extension-manager registration file.
    pub vm_manager_file: Utf8PathBuf,
    /// VM core-extension list file.
    pub vm_core_file: Utf8PathBuf,
    /// GUI extension index file.
    pub gui_index_file: Utf8PathBuf,
    /// GUI dev-server configuration (link mode only).
    pub webpack_config_file: Utf8PathBuf,
}

impl ResolvedPaths {
    /// Resolve all paths from merged options, the extension directory name
    /// and the working directory.
    pub fn resolve(opts: &Options, dir_name: &str, cwd: &Utf8Path) -> Self {
        let gui_root = resolve_from(cwd, opts.gui.as_deref().unwrap_or(DEFAULT_GUI_DIR));
        let vm_root = match opts.vm.as_deref() {
            Some(vm) => resolve_from(cwd, vm),
            None => gui_root.join(DEFAULT_VM_SUBDIR),
        };
        let block_src = resolve_from(cwd, opts.block.as_deref().unwrap_or(DEFAULT_BLOCK_DIR));
        let entry_src = resolve_from(cwd, opts.entry.as_deref().unwrap_or(DEFAULT_ENTRY_DIR));

        let vm_ext_dir = vm_root.join("src/extensions").join(dir_name);
        let gui_ext_dir = gui_root.join("src/lib/libraries/extensions").join(dir_name);
        let block_file = vm_ext_dir.join("index.js");
        let entry_file = gui_ext_dir.join("index.jsx");

        Self {
            vm_manager_file: vm_root.join("src/extension-support/extension-manager.js"),
            vm_core_file: vm_root.join("src/virtual-machine.js"),
            gui_index_file: gui_root.join("src/lib/libraries/extensions/index.jsx"),
            webpack_config_file: gui_root.join("webpack.config.js"),
            gui_root,
            vm_root,
            block_src,
            entry_src,
            vm_ext_dir,
            gui_ext_dir,
            block_file,
            entry_file,
        }
    }

    /// Root of the local VM source mirror (`<block>/../..`), used for
    /// `--use` back-links in link mode.
    pub fn vm_mirror_root(&self) -> Option<&Utf8Path> {
        self.block_src.parent().and_then(Utf8Path::parent)
    }
}

/// Resolve `path` against an absolute `base`, normalizing `.` and `..`
/// lexically.
fn resolve_from(base: &Utf8Path, path: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(path);
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use camino::Utf8Path;

    use super::ResolvedPaths;
    use crate::config::Options;

    fn options() -> Options {
        Options {
            id: Some("foo".to_string()),
            ..Options::default()
        }
    }

    #[test]
    fn defaults_resolve_against_cwd() {
        let paths = ResolvedPaths::resolve(&options(), "foo", Utf8Path::new("/work/ext"));
        assert_eq!(paths.gui_root, "/work/scratch-gui");
        assert_eq!(paths.vm_root, "/work/scratch-gui/node_modules/scratch-vm");
        assert_eq!(paths.block_src, "/work/ext/src/vm/extensions/block");
        assert_eq!(
            paths.entry_src,
            "/work/ext/src/gui/lib/libraries/extensions/entry"
        );
        assert_eq!(
            paths.vm_ext_dir,
            "/work/scratch-gui/node_modules/scratch-vm/src/extensions/foo"
        );
        assert_eq!(
            paths.gui_index_file,
            "/work/scratch-gui/src/lib/libraries/extensions/index.jsx"
        );
    }

    #[test]
    fn explicit_vm_root_wins_over_gui_derivation() {
        let opts = Options {
            vm: Some("../scratch-vm".to_string()),
            ..options()
        };
        let paths = ResolvedPaths::resolve(&opts, "foo", Utf8Path::new("/work/ext"));
        assert_eq!(paths.vm_root, "/work/scratch-vm");
        assert_eq!(paths.vm_manager_file.as_str(),
            "/work/scratch-vm/src/extension-support/extension-manager.js");
    }

    #[test]
    fn dir_name_is_used_for_both_ext_dirs() {
        let paths = ResolvedPaths::resolve(&options(), "renamed", Utf8Path::new("/work/ext"));
        assert!(paths.vm_ext_dir.as_str().ends_with("/extensions/renamed"));
        assert!(paths.gui_ext_dir.as_str().ends_with("/extensions/renamed"));
        assert_eq!(paths.block_file, paths.vm_ext_dir.join("index.js"));
        assert_eq!(paths.entry_file, paths.gui_ext_dir.join("index.jsx"));
    }

    #[test]
    fn absolute_flags_are_kept() {
        let opts = Options {
            gui: Some("/opt/scratch-gui".to_string()),
            block: Some("/opt/ext/block".to_string()),
            ..options()
        };
        let paths = ResolvedPaths::resolve(&opts, "foo", Utf8Path::new("/work/ext"));
        assert_eq!(paths.gui_root, "/opt/scratch-gui");
        assert_eq!(paths.block_src, "/opt/ext/block");
    }

    #[test]
    fn vm_mirror_root_is_two_levels_up_from_block() {
        let paths = ResolvedPaths::resolve(&options(), "foo", Utf8Path::new("/work/ext"));
        assert_eq!(
            paths.vm_mirror_root().map(camino::Utf8Path::as_str),
            Some("/work/ext/src/vm")
        );
    }
}
