//! Include controller and per-file scan loop.
//!
//! The root file is opened through a [`SourceProvider`]; every line runs
//! through the [`Classifier`] and the resulting [`RowKind`] is applied to the
//! document. Include directives recurse into [`Loader::include_file`], which
//! keeps the stack of open files and silently breaks cycles.

use std::path::{Path, PathBuf};

use crate::context::{LoadOptions, ParseContext, Target};
use crate::document::Document;
use crate::error::{ConfError, Fault};
use crate::macros;
use crate::row::{Classifier, Continuation, IncludePolicy, RowKind};
use crate::source::{FileSystemProvider, SourceProvider};

/// File name reported for text parsed with [`load_str`].
pub const INLINE_SOURCE: &str = "<inline>";

/// Parse the configuration rooted at `path` from the filesystem.
pub fn load(path: &Path, options: &LoadOptions) -> Result<Document, ConfError> {
    load_with_provider(path, options, &FileSystemProvider)
}

/// Parse the configuration rooted at `path` using `provider` for all I/O.
pub fn load_with_provider(
    path: &Path,
    options: &LoadOptions,
    provider: &dyn SourceProvider,
) -> Result<Document, ConfError> {
    let root = provider.canonicalize(path).map_err(|e| {
        ConfError::io(
            &path.display().to_string(),
            format!("cannot open file: {e}"),
        )
    })?;
    let mut loader = Loader::new(options, provider);
    if loader.ctx.conf_root.is_none() {
        loader.ctx.conf_root = root.parent().map(Path::to_path_buf);
    }
    loader.include_file(&root)?;
    Ok(loader.doc)
}

/// Parse configuration text held in memory. Relative includes resolve
/// against the conf root, or the working directory when none is set.
pub fn load_str(text: &str, options: &LoadOptions) -> Result<Document, ConfError> {
    load_str_with_provider(text, options, &FileSystemProvider)
}

pub fn load_str_with_provider(
    text: &str,
    options: &LoadOptions,
    provider: &dyn SourceProvider,
) -> Result<Document, ConfError> {
    let mut loader = Loader::new(options, provider);
    let dir = loader
        .ctx
        .conf_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    loader.scan(INLINE_SOURCE, &dir, text)?;
    Ok(loader.doc)
}

struct Loader<'p> {
    provider: &'p dyn SourceProvider,
    ctx: ParseContext,
    doc: Document,
}

/// Property currently receiving continuation lines.
struct Pending {
    key: String,
    /// No heredoc body line has been written yet.
    fresh: bool,
}

impl<'p> Loader<'p> {
    fn new(options: &LoadOptions, provider: &'p dyn SourceProvider) -> Self {
        Loader {
            provider,
            ctx: ParseContext::new(options),
            doc: Document::new(),
        }
    }

    /// Scan `path` unless it is already open further up the include chain.
    fn include_file(&mut self, path: &Path) -> Result<(), ConfError> {
        let name = path.display().to_string();
        if self.ctx.is_open(path) {
            tracing::debug!(file = %name, "include cycle, skipping");
            return Ok(());
        }
        let text = self
            .provider
            .read_source(path)
            .map_err(|e| ConfError::io(&name, format!("cannot read file: {e}")))?;
        tracing::debug!(file = %name, depth = self.ctx.depth(), "reading file");

        self.doc.add_file(path.to_path_buf());
        self.ctx.push(path.to_path_buf());
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let result = self.scan(&name, &dir, &text);
        self.ctx.pop();
        result
    }

    fn scan(&mut self, file: &str, dir: &Path, text: &str) -> Result<(), ConfError> {
        let mut continuation = Continuation::None;
        let mut pending: Option<Pending> = None;
        let mut skipping = false;
        let mut last_line = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            last_line = line_no;
            let at = |f: Fault| f.at(file, line_no, raw);

            let kind = Classifier {
                doc: &self.doc,
                claims: &self.ctx.claims,
                in_macro: self.ctx.in_macro(),
                skipping,
            }
            .classify(raw, &continuation)
            .map_err(at)?;
            tracing::trace!(file, line = line_no, ?kind, "row");
            continuation = kind.continuation_after(&continuation);

            match kind {
                RowKind::Blank | RowKind::Comment | RowKind::Skip => {}
                RowKind::SkipSection => {
                    tracing::debug!(file, line = line_no, "claims denied, skipping section");
                    skipping = true;
                }
                RowKind::Section(name) => {
                    skipping = false;
                    self.doc.register_section(&name);
                    self.ctx.target = Target::Section(name);
                }
                RowKind::Include { policy, target } => {
                    if !self.include(dir, &policy, &target).map_err(|e| match e {
                        IncludeError::Fault(f) => at(f),
                        IncludeError::Nested(e) => e,
                    })? {
                        skipping = true;
                    }
                }
                RowKind::MacroDefine { name, params } => {
                    skipping = false;
                    macros::define(&mut self.doc, &name, params);
                    self.ctx.target = Target::Macro(name);
                }
                RowKind::MacroUse { name, args } => {
                    macros::expand(&mut self.doc, &self.ctx.target, &name, &args).map_err(at)?;
                }
                RowKind::Property { key, value, .. } => {
                    self.doc.upsert(&self.ctx.target, &key, &value);
                    pending = Some(Pending { key, fresh: true });
                }
                RowKind::Fragment { value, .. } => {
                    if let Some(p) = &pending {
                        self.doc.append(&self.ctx.target, &p.key, &value);
                    }
                }
                RowKind::HeredocLine(value) => {
                    if let Some(p) = &mut pending {
                        if p.fresh {
                            self.doc.upsert(&self.ctx.target, &p.key, &value);
                            p.fresh = false;
                        } else {
                            self.doc.append_line(&self.ctx.target, &p.key, &value);
                        }
                    }
                }
                RowKind::HeredocEnd => pending = None,
            }
        }

        if let Continuation::Heredoc(marker) = continuation {
            return Err(Fault::structural(format!(
                "heredoc not terminated, expected a line {marker:?} before end of file"
            ))
            .at(file, last_line, ""));
        }
        Ok(())
    }

    /// Run an include directive. Returns `false` when an optional target is
    /// absent and the section must be skipped.
    fn include(
        &mut self,
        dir: &Path,
        policy: &IncludePolicy,
        target: &str,
    ) -> Result<bool, IncludeError> {
        let path = self
            .ctx
            .resolve_include(self.provider, dir, policy, target)?;
        let canonical = match self.provider.canonicalize(&path) {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return match policy {
                    IncludePolicy::Required => Err(Fault::io(format!(
                        "included file {} not found",
                        path.display()
                    ))
                    .into()),
                    IncludePolicy::IfExists | IncludePolicy::IfExistsIn(_) => {
                        tracing::debug!(path = %path.display(), "optional include absent, skipping section");
                        Ok(false)
                    }
                };
            }
            Err(e) => {
                return Err(Fault::io(format!("cannot open {}: {e}", path.display())).into())
            }
        };

        let saved = self.ctx.target.clone();
        let result = self.include_file(&canonical);
        self.ctx.target = saved;
        result.map_err(IncludeError::Nested)?;
        Ok(true)
    }
}

/// Include failures: either located at the directive row, or already
/// located inside the included file.
enum IncludeError {
    Fault(Fault),
    Nested(ConfError),
}

impl From<Fault> for IncludeError {
    fn from(f: Fault) -> Self {
        IncludeError::Fault(f)
    }
}
