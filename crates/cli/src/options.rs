//! Load options for `claimconf`: an optional TOML file merged with flags.
//!
//! # Example
//!
//! ```toml
//! claims = ["prod", "eu"]
//! conf_root = "/etc/app"
//!
//! [base_paths]
//! site = "/srv/site/conf"
//! ```
//!
//! Relative directories in the file are taken relative to the file itself.
//! Flags (`--claim`, `--base-path`, `--conf-root`) are applied on top.

use std::path::{Path, PathBuf};

use claimconf_core::{BasePaths, LoadOptions};

/// Flags shared by every subcommand that parses a file.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct OptionArgs {
    /// Claim held by the parse (repeatable)
    #[arg(long = "claim", value_name = "CLAIM")]
    pub claims: Vec<String>,

    /// Named base path for include_<name>_if_exists (repeatable)
    #[arg(long = "base-path", value_name = "NAME=DIR")]
    pub base_paths: Vec<String>,

    /// Directory that ^/ include targets resolve against
    #[arg(long, value_name = "DIR")]
    pub conf_root: Option<PathBuf>,

    /// TOML file with claims, base_paths and conf_root
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse an options TOML file from `path`.
///
/// Returns a human-readable error string on failure.
pub(crate) fn read_options_file(path: &Path) -> Result<LoadOptions, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let mut options: LoadOptions = toml::from_str(&content)
        .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;

    let base = path.parent().unwrap_or(Path::new("."));
    for dir in options.base_paths.values_mut() {
        *dir = base.join(&*dir);
    }
    if let Some(root) = options.conf_root.take() {
        options.conf_root = Some(base.join(root));
    }
    Ok(options)
}

/// Merge the options file (if any) with command-line flags.
pub(crate) fn build_load_options(args: &OptionArgs) -> Result<LoadOptions, String> {
    let mut options = match &args.options {
        Some(path) => read_options_file(path)?,
        None => LoadOptions::new(),
    };
    options = options.with_claims(args.claims.iter().cloned());
    for spec in &args.base_paths {
        let (name, dir) = BasePaths::parse_spec(spec).map_err(|e| e.message)?;
        options = options.with_base_path(name, dir);
    }
    if let Some(root) = &args.conf_root {
        options = options.with_conf_root(root);
    }
    tracing::debug!(?options, "load options");
    Ok(options)
}
