//! Parse context: the run-time state threaded through one root parse.
//!
//! Holds the claim set, the current target (section or macro body being
//! accumulated), the stack of files currently open, and the path-resolution
//! collaborator (named base paths plus the conf root).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::claims::ClaimSet;
use crate::error::Fault;
use crate::row::IncludePolicy;
use crate::source::SourceProvider;

/// Prefix of include targets resolved against the conf root.
pub const CONF_ROOT_PREFIX: &str = "^/";

/// Where property rows are currently written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Section(String),
    Macro(String),
}

impl Default for Target {
    fn default() -> Self {
        Target::Section(String::new())
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Caller-supplied settings for a parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Claims held by the parse; gates conditional sections.
    pub claims: ClaimSet,
    /// Named directories for `include_<name>_if_exists` directives.
    pub base_paths: BTreeMap<String, PathBuf>,
    /// Anchor for `^/` include targets. Defaults to the root file's directory.
    pub conf_root: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims.extend(claims);
        self
    }

    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claims.insert(claim);
        self
    }

    pub fn with_base_path(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.base_paths.insert(name.into(), dir.into());
        self
    }

    pub fn with_conf_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.conf_root = Some(dir.into());
        self
    }
}

// ── Base paths ───────────────────────────────────────────────────────────────

/// Named base directories usable by include directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasePaths(BTreeMap<String, PathBuf>);

impl BasePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, dir: impl Into<PathBuf>) {
        self.0.insert(name.into(), dir.into());
    }

    /// Register a `name=dir` pair.
    pub fn insert_spec(&mut self, spec: &str) -> Result<(), Fault> {
        let (name, dir) = Self::parse_spec(spec)?;
        self.insert(name, dir);
        Ok(())
    }

    /// Split a `name=dir` pair. Relative directories are made absolute
    /// against the current working directory.
    pub fn parse_spec(spec: &str) -> Result<(String, PathBuf), Fault> {
        let (name, dir) = spec
            .split_once('=')
            .ok_or_else(|| Fault::structural(format!("base path {spec:?} is not name=dir")))?;
        let (name, dir) = (name.trim(), dir.trim());
        if name.is_empty() || dir.is_empty() {
            return Err(Fault::structural(format!(
                "base path {spec:?} has an empty name or directory"
            )));
        }
        let dir = std::path::absolute(dir)
            .map_err(|e| Fault::io(format!("could not make {dir:?} absolute: {e}")))?;
        Ok((name.to_owned(), dir))
    }

    pub fn get(&self, name: &str) -> Result<&Path, Fault> {
        self.0
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Fault::reference(format!("base path {name:?} is not defined")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, PathBuf>> for BasePaths {
    fn from(map: BTreeMap<String, PathBuf>) -> Self {
        BasePaths(map)
    }
}

// ── Parse context ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ParseContext {
    pub claims: ClaimSet,
    pub target: Target,
    pub base_paths: BasePaths,
    pub conf_root: Option<PathBuf>,
    stack: Vec<PathBuf>,
}

impl ParseContext {
    pub fn new(options: &LoadOptions) -> Self {
        ParseContext {
            claims: options.claims.clone(),
            target: Target::default(),
            base_paths: BasePaths::from(options.base_paths.clone()),
            conf_root: options.conf_root.clone(),
            stack: Vec::new(),
        }
    }

    pub fn in_macro(&self) -> bool {
        matches!(self.target, Target::Macro(_))
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.stack.iter().any(|p| p == path)
    }

    pub fn push(&mut self, path: PathBuf) {
        self.stack.push(path);
    }

    pub fn pop(&mut self) -> Option<PathBuf> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Build the absolute path an include directive points at.
    ///
    /// `^/` targets resolve against the conf root, `IfExistsIn` targets
    /// against their named base path, everything else against `file_dir`.
    pub fn resolve_include(
        &self,
        provider: &dyn SourceProvider,
        file_dir: &Path,
        policy: &IncludePolicy,
        target: &str,
    ) -> Result<PathBuf, Fault> {
        let io = |e: std::io::Error| Fault::io(format!("could not resolve {target:?}: {e}"));
        if let Some(rest) = target.strip_prefix(CONF_ROOT_PREFIX) {
            let root = self
                .conf_root
                .as_deref()
                .ok_or_else(|| Fault::reference("conf root is not defined"))?;
            return provider.resolve_import(root, rest).map_err(io);
        }
        let base = match policy {
            IncludePolicy::IfExistsIn(name) => self.base_paths.get(name)?,
            IncludePolicy::Required | IncludePolicy::IfExists => file_dir,
        };
        provider.resolve_import(base, target).map_err(io)
    }
}
