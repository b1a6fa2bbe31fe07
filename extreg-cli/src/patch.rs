//! Bundled base patches for pristine upstream (LLK) checkouts.
//!
//! The patches are piped to the host `patch` utility with the matching
//! project root as working directory. `-N` keeps an already-patched tree
//! from being touched twice; a failure here (utility missing, hunk already
//! applied, reject) is reported by the caller and is not fatal.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, bail};
use camino::Utf8Path;
use tracing::info;

/// The upstream variant whose checkouts need patching before install.
pub const LLK_BASE: &str = "LLK";

const VM_PATCH_NAME: &str = "llk-scratch-vm.patch";
const GUI_PATCH_NAME: &str = "llk-scratch-gui.patch";
const VM_PATCH: &str = include_str!("../patches/llk-scratch-vm.patch");
const GUI_PATCH: &str = include_str!("../patches/llk-scratch-gui.patch");

/// Apply the bundled VM and GUI patches to the two checkout roots.
pub fn apply_base_patches(vm_root: &Utf8Path, gui_root: &Utf8Path) -> anyhow::Result<()> {
    apply_patch(vm_root, VM_PATCH_NAME, VM_PATCH)?;
    info!("Apply patch: {}", VM_PATCH_NAME);
    apply_patch(gui_root, GUI_PATCH_NAME, GUI_PATCH)?;
    info!("Apply patch: {}", GUI_PATCH_NAME);
    Ok(())
}

fn apply_patch(root: &Utf8Path, name: &str, contents: &str) -> anyhow::Result<()> {
    let mut child = Command::new("patch")
        .args(["-p1", "-N", "-s"])
        .current_dir(root)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn patch for {name} in {root}"))?;

    {
        let mut stdin = child.stdin.take().context("open patch stdin")?;
        stdin
            .write_all(contents.as_bytes())
            .with_context(|| format!("feed {name} to patch"))?;
    }

    let status = child
        .wait()
        .with_context(|| format!("wait for patch {name}"))?;
    if !status.success() {
        bail!("patch {name} in {root} exited with {status}");
    }
    Ok(())
}
