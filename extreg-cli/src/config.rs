//! Configuration file loading for extreg.
//!
//! Discovers and loads `extreg.toml` from the working directory and merges
//! it with CLI arguments (CLI takes precedence). The config file lets an
//! extension project pin its registration settings instead of repeating
//! them on every invocation.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "extreg.toml";

/// Top-level configuration from extreg.toml.
///
/// Every key mirrors a CLI flag of the same name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Extension identifier.
    pub id: Option<String>,

    /// Extension directory name (defaults to the id).
    pub dir: Option<String>,

    /// Path to the GUI project root.
    pub gui: Option<String>,

    /// Path to the VM project root.
    pub vm: Option<String>,

    /// Local path to the extension runtime (block) source.
    pub block: Option<String>,

    /// Local path to the extension GUI entry source.
    pub entry: Option<String>,

    /// Upstream variant of the target checkouts.
    pub base: Option<String>,

    /// Literal to substitute for the extension URL constant.
    pub url: Option<String>,

    /// Install via symbolic links instead of copying.
    pub link: bool,

    /// Also register the extension as a core extension.
    pub core: bool,

    /// Extra subdirectory names to back-link in link mode.
    #[serde(rename = "use")]
    pub use_dirs: Vec<String>,
}

/// Flag values collected from the command line; `None` / `false` / empty
/// means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliSettings {
    pub id: Option<String>,
    pub dir: Option<String>,
    pub gui: Option<String>,
    pub vm: Option<String>,
    pub block: Option<String>,
    pub entry: Option<String>,
    pub base: Option<String>,
    pub url: Option<String>,
    pub link: bool,
    pub core: bool,
    pub use_dirs: Vec<String>,
}

/// Merged options for one invocation, immutable after construction.
///
/// Path-like fields stay unresolved strings here; `paths::ResolvedPaths`
/// turns them into absolute paths with their defaults applied.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub id: Option<String>,
    pub dir: Option<String>,
    pub gui: Option<String>,
    pub vm: Option<String>,
    pub block: Option<String>,
    pub entry: Option<String>,
    pub base: Option<String>,
    pub url: Option<String>,
    pub link: bool,
    pub core: bool,
    pub use_dirs: Vec<String>,
}

/// Discover the extreg.toml config file in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse an extreg.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<FileConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
    parse_config(&contents).with_context(|| format!("parse config file {path}"))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<FileConfig> {
    let config: FileConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return the default if not found.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<FileConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(FileConfig::default()),
    }
}

/// Combines config-file settings with CLI arguments.
///
/// CLI arguments take precedence; boolean flags are OR-merged (a config
/// `true` cannot be switched off by omitting the flag) and `use` lists are
/// concatenated config-first.
#[derive(Debug, Clone)]
pub struct ConfigMerger {
    file: FileConfig,
}

impl ConfigMerger {
    pub fn new(file: FileConfig) -> Self {
        Self { file }
    }

    pub fn merge(self, cli: CliSettings) -> Options {
        let file = self.file;
        let mut use_dirs = file.use_dirs;
        use_dirs.extend(cli.use_dirs);

        Options {
            id: cli.id.or(file.id),
            dir: cli.dir.or(file.dir),
            gui: cli.gui.or(file.gui),
            vm: cli.vm.or(file.vm),
            block: cli.block.or(file.block),
            entry: cli.entry.or(file.entry),
            base: cli.base.or(file.base),
            url: cli.url.or(file.url),
            link: cli.link || file.link,
            core: cli.core || file.core,
            use_dirs,
        }
    }
}

impl Options {
    /// The extension directory name: `dir` when given, the id otherwise.
    pub fn dir_name(&self) -> Option<&str> {
        self.dir.as_deref().or(self.id.as_deref())
    }
}
