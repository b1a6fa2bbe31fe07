use std::env;
use std::process::ExitCode;

use anyhow::{Context, anyhow, bail};
use camino::Utf8PathBuf;
use clap::Parser;
use extreg_cli::config::{self, CliSettings, Options};
use extreg_cli::patch;
use extreg_cli::paths::ResolvedPaths;
use extreg_edit as edit;
use extreg_edit::ApplyStatus;
use extreg_install as install;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "extreg",
    version,
    about = "Install and register an extra extension in local scratch-gui/scratch-vm checkouts."
)]
struct Cli {
    /// Extension identifier.
    #[arg(long)]
    id: Option<String>,

    /// Extension directory name (default: the id).
    #[arg(long)]
    dir: Option<String>,

    /// Path to the GUI project root.
    #[arg(long)]
    gui: Option<String>,

    /// Path to the VM project root (default: <gui>/node_modules/scratch-vm).
    #[arg(long)]
    vm: Option<String>,

    /// Local path to the extension runtime (block) source.
    #[arg(long)]
    block: Option<String>,

    /// Local path to the extension GUI entry source.
    #[arg(long)]
    entry: Option<String>,

    /// Upstream variant of the target checkouts ("LLK" applies the bundled patches).
    #[arg(long)]
    base: Option<String>,

    /// Install via symbolic links instead of copying.
    #[arg(short = 'L', long)]
    link: bool,

    /// Literal to substitute for the extension URL constant.
    #[arg(long)]
    url: Option<String>,

    /// Also register the extension as a core (always loaded) extension.
    #[arg(short = 'C', long)]
    core: bool,

    /// Extra subdirectory names to back-link in link mode.
    #[arg(long = "use", value_name = "NAME")]
    use_dirs: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        error!("{:?}", e);
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cwd = Utf8PathBuf::from_path_buf(env::current_dir().context("get working directory")?)
        .map_err(|p| anyhow!("working directory {} is not valid UTF-8", p.display()))?;

    let file_config = config::load_or_default(&cwd).context("load extreg.toml config")?;
    let opts = config::ConfigMerger::new(file_config).merge(CliSettings {
        id: cli.id,
        dir: cli.dir,
        gui: cli.gui,
        vm: cli.vm,
        block: cli.block,
        entry: cli.entry,
        base: cli.base,
        url: cli.url,
        link: cli.link,
        core: cli.core,
        use_dirs: cli.use_dirs,
    });

    let Some(id) = opts.id.clone() else {
        bail!(r#""--id <extensionID>" is not set"#);
    };
    let dir_name = opts.dir.clone().unwrap_or_else(|| id.clone());
    let paths = ResolvedPaths::resolve(&opts, &dir_name, &cwd);
    debug!("resolved paths: {:#?}", paths);

    // Apply the bundled patches when the checkouts are the original upstream.
    if opts.base.as_deref() == Some(patch::LLK_BASE) {
        if let Err(e) = patch::apply_base_patches(&paths.vm_root, &paths.gui_root) {
            warn!("{:?}", e);
        }
    }

    if opts.link {
        install_linked(&opts, &paths)?;
    } else {
        install::install_copy(&paths.block_src, &paths.vm_ext_dir)?;
        install::install_copy(&paths.entry_src, &paths.gui_ext_dir)?;
    }

    if let Some(url) = &opts.url {
        substitute_urls(&paths, url)?;
    }

    register(&paths, &opts, &id, &dir_name)?;

    Ok(())
}

fn install_linked(opts: &Options, paths: &ResolvedPaths) -> anyhow::Result<()> {
    install::ensure_symlink(&paths.block_src, &paths.vm_ext_dir)?;
    install::ensure_symlink(&paths.entry_src, &paths.gui_ext_dir)?;

    // The dev server only sees linked sources when it follows symlinks.
    if paths.webpack_config_file.exists() {
        match edit::apply_registration(&paths.webpack_config_file, edit::enable_follow_symlinks)? {
            ApplyStatus::Applied => {
                info!("Follow symlinks in dev server: {}", paths.webpack_config_file);
            }
            ApplyStatus::Skipped => {
                debug!("dev server already follows symlinks");
            }
        }
    } else {
        debug!(
            "no dev server config at {}, skipping follow-symlinks",
            paths.webpack_config_file
        );
    }

    if !opts.use_dirs.is_empty() {
        let mirror_root = paths
            .vm_mirror_root()
            .with_context(|| format!("block source {} has no mirror root", paths.block_src))?;
        for name in &opts.use_dirs {
            install::ensure_symlink(&paths.vm_root.join("src").join(name), &mirror_root.join(name))?;
        }
    }

    Ok(())
}

fn substitute_urls(paths: &ResolvedPaths, url: &str) -> anyhow::Result<()> {
    let entry = edit::apply_url_substitution(&paths.entry_file, |code| {
        edit::substitute_entry_url(code, url)
    })?;
    match entry {
        ApplyStatus::Applied => info!("Entry: extensionURL = {}", url),
        ApplyStatus::Skipped => debug!("no extensionURL assignment in {}", paths.entry_file),
    }

    let block = edit::apply_url_substitution(&paths.block_file, |code| {
        edit::substitute_block_url(code, url)
    })?;
    match block {
        ApplyStatus::Applied => info!("Block: extensionURL = {}", url),
        ApplyStatus::Skipped => debug!("no extensionURL assignment in {}", paths.block_file),
    }

    Ok(())
}

fn register(paths: &ResolvedPaths, opts: &Options, id: &str, dir_name: &str) -> anyhow::Result<()> {
    match edit::apply_registration(&paths.vm_manager_file, |code| {
        edit::register_in_manager(code, id, dir_name)
    })? {
        ApplyStatus::Applied => info!("Registered in manager: {}", id),
        ApplyStatus::Skipped => info!("Already registered in manager: {}", id),
    }

    if opts.core {
        match edit::apply_registration(&paths.vm_core_file, |code| {
            edit::register_as_core(code, id)
        })? {
            ApplyStatus::Applied => info!("Add as a core extension: {}", id),
            ApplyStatus::Skipped => info!("Already added as a core extension: {}", id),
        }
    }

    match edit::apply_registration(&paths.gui_index_file, |code| {
        edit::register_in_gui_index(code, id, dir_name)
    })? {
        ApplyStatus::Applied => info!("Added to extension list: {}", id),
        ApplyStatus::Skipped => info!("Already added to extension list: {}", id),
    }

    Ok(())
}
