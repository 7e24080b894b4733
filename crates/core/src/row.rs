//! Row classification.
//!
//! Turns one physical line, plus the continuation state left by the previous
//! row, into a [`RowKind`] with its fields extracted. Header syntax:
//!
//! ```text
//! [name]                       section
//! [name?a&b]  [name?a,b]       conditional section (AND / OR)
//! [include=file.conf]          include, target must exist
//! [include_if_exists=file]     include, skip the section when absent
//! [include_site_if_exists=f]   same, relative to base path "site"
//! [define name($p1, $p2)]      open a macro body
//! [use name(v1, "v,2")]        expand a macro
//! ```

use crate::claims::{self, ClaimSet};
use crate::constants;
use crate::document::Document;
use crate::error::Fault;
use crate::mask::{Direction, Mark, MaskedLine, Pattern};

pub const COMMENT: char = '#';
const HEREDOC_OPENER: &str = "<<";
const OPEN: &[Mark] = &[Mark::Open];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludePolicy {
    /// `include=`: a missing target is an error.
    Required,
    /// `include_if_exists=`: a missing target skips the section.
    IfExists,
    /// `include_<name>_if_exists=`: as `IfExists`, relative to base path `name`.
    IfExistsIn(String),
}

/// Continuation state carried from one row to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Continuation {
    #[default]
    None,
    Backslash,
    /// Heredoc body; the string is the terminating marker.
    Heredoc(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Blank,
    Comment,
    /// Ignored because the enclosing section is skipped.
    Skip,
    /// A header whose claims were denied.
    SkipSection,
    Section(String),
    Include {
        policy: IncludePolicy,
        target: String,
    },
    MacroDefine {
        name: String,
        params: Vec<String>,
    },
    MacroUse {
        name: String,
        args: Vec<String>,
    },
    Property {
        key: String,
        value: String,
        continuation: Continuation,
    },
    /// A backslash-continued line; `more` is set when it continues again.
    Fragment {
        value: String,
        more: bool,
    },
    HeredocLine(String),
    HeredocEnd,
}

impl RowKind {
    /// Continuation state for the row that follows this one.
    pub fn continuation_after(&self, current: &Continuation) -> Continuation {
        match self {
            RowKind::Property { continuation, .. } => continuation.clone(),
            RowKind::Fragment { more: true, .. } => Continuation::Backslash,
            RowKind::HeredocLine(_) => current.clone(),
            _ => Continuation::None,
        }
    }
}

/// Classifies rows against the document state at the time they are read.
pub struct Classifier<'a> {
    pub doc: &'a Document,
    pub claims: &'a ClaimSet,
    /// Rows are accumulating into a macro body; constants stay unresolved.
    pub in_macro: bool,
    /// The current section is skipped.
    pub skipping: bool,
}

impl Classifier<'_> {
    pub fn classify(&self, raw: &str, continuation: &Continuation) -> Result<RowKind, Fault> {
        match continuation {
            Continuation::Heredoc(marker) => return self.heredoc_line(raw, marker),
            Continuation::Backslash => return self.fragment(raw),
            Continuation::None => {}
        }

        let mut line = MaskedLine::new(raw, Some(COMMENT));
        line.trim_ends(Mark::Blank, Mark::Open);
        let (first, last) = match (
            line.first(Pattern::Any, Mark::Open),
            line.last(Pattern::Any, Mark::Open),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ if line.comment().is_some() => return Ok(RowKind::Comment),
            _ => return Ok(RowKind::Blank),
        };

        if first < last && line.char_at(first) == Some('[') && line.char_at(last) == Some(']') {
            return self.header(line, first, last);
        }
        if self.skipping {
            return Ok(RowKind::Skip);
        }
        self.property(line)
    }

    // ── Headers ──────────────────────────────────────────────────────────

    fn header(&self, mut line: MaskedLine, open: usize, close: usize) -> Result<RowKind, Fault> {
        line.set_mark(open, Mark::Hidden);
        line.set_mark(close, Mark::Hidden);

        if self.skipping {
            let body = line.render(OPEN);
            let body = body.trim_start();
            if body.starts_with("use ") || (body.starts_with("include") && body.contains('=')) {
                return Ok(RowKind::Skip);
            }
        }

        if let Some(q) = line.first_from(open, Pattern::Chars(&['?']), Mark::Open) {
            line.set_mark(q, Mark::Hidden);
            if !claims::evaluate(&mut line, q + 1, close, self.doc, self.claims)? {
                return Ok(RowKind::SkipSection);
            }
        }
        trim_open(&mut line);

        let body = line.render(OPEN);
        if let Some(eq) = line.first(Pattern::Chars(&['=']), Mark::Open) {
            if body.starts_with("include") {
                return include(&mut line, eq);
            }
        }
        if line.mark_prefix("define ", Mark::Hidden, Mark::Open).is_some() {
            let (name, params) = macro_signature(&mut line)?;
            return Ok(RowKind::MacroDefine { name, params });
        }
        if line.mark_prefix("use ", Mark::Hidden, Mark::Open).is_some() {
            let (name, args) = macro_signature(&mut line)?;
            return Ok(RowKind::MacroUse { name, args });
        }
        if body.is_empty() {
            return Err(Fault::structural("empty section name"));
        }
        Ok(RowKind::Section(body))
    }

    // ── Properties ───────────────────────────────────────────────────────

    fn property(&self, mut line: MaskedLine) -> Result<RowKind, Fault> {
        if !self.in_macro {
            constants::resolve(&mut line, self.doc)?;
        }
        let eq = line
            .mark_first('=', Mark::Hidden, Mark::Open)
            .ok_or_else(|| Fault::structural("unrecognized row"))?;
        line.trim_around(eq, Mark::Blank, Mark::Open);

        let key = line.render_range(0, eq, OPEN);
        if key.is_empty() {
            return Err(Fault::structural("property has an empty key"));
        }

        let backslash = trailing_backslash(&line);
        if let Some(pos) = backslash {
            line.set_mark(pos, Mark::Hidden);
        }
        let value = line.render_range(eq + 1, line.end(), OPEN);

        if let Some(marker) = value.strip_prefix(HEREDOC_OPENER) {
            let marker = marker.trim();
            if !marker.is_empty() && backslash.is_none() {
                return Ok(RowKind::Property {
                    key,
                    value: String::new(),
                    continuation: Continuation::Heredoc(marker.to_owned()),
                });
            }
        }
        let continuation = match backslash {
            Some(_) => Continuation::Backslash,
            None => Continuation::None,
        };
        Ok(RowKind::Property {
            key,
            value,
            continuation,
        })
    }

    fn fragment(&self, raw: &str) -> Result<RowKind, Fault> {
        let mut line = MaskedLine::new(raw, Some(COMMENT));
        if !self.in_macro {
            constants::resolve(&mut line, self.doc)?;
        }
        let backslash = trailing_backslash(&line);
        if let Some(pos) = backslash {
            line.set_mark(pos, Mark::Hidden);
        }
        let end = line.end();
        if line.comment().is_some() && end > 0 {
            line.mark_whitespace_run(end - 1, Direction::Backward, Mark::Blank, Mark::Open);
        }
        Ok(RowKind::Fragment {
            value: line.render(OPEN),
            more: backslash.is_some(),
        })
    }

    fn heredoc_line(&self, raw: &str, marker: &str) -> Result<RowKind, Fault> {
        if raw == marker {
            return Ok(RowKind::HeredocEnd);
        }
        if self.in_macro {
            return Ok(RowKind::HeredocLine(raw.to_owned()));
        }
        constants::resolve_str(raw, self.doc).map(RowKind::HeredocLine)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Trim whitespace at both ends of what is still open in a header body.
fn trim_open(line: &mut MaskedLine) {
    if let Some(first) = line.first(Pattern::Any, Mark::Open) {
        line.mark_whitespace_run(first, Direction::Forward, Mark::Blank, Mark::Open);
    }
    if let Some(last) = line.last(Pattern::Any, Mark::Open) {
        line.mark_whitespace_run(last, Direction::Backward, Mark::Blank, Mark::Open);
    }
}

/// Position of a continuation backslash, if the line ends with one.
///
/// With a trailing comment, whitespace between the backslash and the comment
/// is ignored. Without one, the backslash must be the last character. A run
/// of an even number of backslashes is literal text.
fn trailing_backslash(line: &MaskedLine) -> Option<usize> {
    let mut end = line.end();
    if line.comment().is_some() {
        while end > 0 && line.char_at(end - 1).is_some_and(char::is_whitespace) {
            end -= 1;
        }
    }
    if end == 0 {
        return None;
    }
    let run = line.scan(
        end - 1,
        Direction::Backward,
        crate::mask::UNBOUNDED,
        1,
        Pattern::Chars(&['\\']),
        Mark::Open,
    );
    if run.first() == Some(&(end - 1)) && run.len() % 2 == 1 {
        Some(end - 1)
    } else {
        None
    }
}

fn include(line: &mut MaskedLine, eq: usize) -> Result<RowKind, Fault> {
    line.set_mark(eq, Mark::Hidden);
    line.trim_around(eq, Mark::Blank, Mark::Open);
    let directive = line.render_range(0, eq, OPEN);
    let target = line.render_range(eq + 1, line.end(), OPEN);

    let policy = match directive.as_str() {
        "include" => IncludePolicy::Required,
        "include_if_exists" => IncludePolicy::IfExists,
        other => match other
            .strip_prefix("include_")
            .and_then(|rest| rest.strip_suffix("_if_exists"))
        {
            Some(name) if !name.is_empty() => IncludePolicy::IfExistsIn(name.to_owned()),
            _ => {
                return Err(Fault::structural(format!(
                    "unrecognized include directive {directive:?}"
                )))
            }
        },
    };
    if target.is_empty() {
        return Err(Fault::structural("include directive without a target"));
    }
    Ok(RowKind::Include { policy, target })
}

/// Parse `name(a, b)` or a bare `name` after the `define`/`use` keyword.
fn macro_signature(line: &mut MaskedLine) -> Result<(String, Vec<String>), Fault> {
    let quotes = line.mark_all('"', Mark::Hidden, Mark::Open);
    if quotes.len() % 2 != 0 {
        return Err(Fault::structural(format!(
            "uneven number of quotation marks in {:?}",
            line.text()
        )));
    }
    for pair in quotes.chunks(2) {
        line.mark_span(pair[0] + 1, pair[1], Mark::Quoted);
    }

    let left = line.mark_first('(', Mark::Hidden, Mark::Open);
    let right = line.mark_last(')', Mark::Hidden, Mark::Open);
    let (l, r) = match (left, right) {
        (None, None) => {
            let name = line.render(OPEN).trim().to_owned();
            return Ok((check_name(name)?, Vec::new()));
        }
        (Some(l), Some(r)) if l < r => (l, r),
        (Some(_), Some(_)) | (None, Some(_)) => {
            return Err(Fault::structural(format!("missing '(' in {:?}", line.text())))
        }
        (Some(_), None) => {
            return Err(Fault::structural(format!("missing ')' in {:?}", line.text())))
        }
    };
    if !line.render_range(r + 1, line.end(), OPEN).trim().is_empty() {
        return Err(Fault::structural(format!(
            "unexpected text after ')' in {:?}",
            line.text()
        )));
    }
    let name = check_name(line.render_range(0, l, OPEN).trim().to_owned())?;

    let commas: Vec<usize> = line
        .find_all(Pattern::Chars(&[',']), Mark::Open)
        .into_iter()
        .filter(|&c| c > l && c < r)
        .collect();
    for &c in &commas {
        line.set_mark(c, Mark::Delimiter);
    }
    line.mark_whitespace_run(l + 1, Direction::Forward, Mark::Blank, Mark::Open);
    if r > 0 {
        line.mark_whitespace_run(r - 1, Direction::Backward, Mark::Blank, Mark::Open);
    }
    for &c in &commas {
        line.trim_around(c, Mark::Blank, Mark::Open);
    }

    let quoted = quotes.iter().any(|&q| q > l && q < r);
    let mut items = line.render_segments(l + 1, r, &[Mark::Open, Mark::Quoted]);
    if commas.is_empty() && !quoted && items.iter().all(String::is_empty) {
        items.clear();
    }
    Ok((name, items))
}

fn check_name(name: String) -> Result<String, Fault> {
    if name.is_empty() {
        Err(Fault::structural("macro header without a name"))
    } else if name.contains(',') {
        Err(Fault::structural(format!("macro name {name:?} contains ','")))
    } else {
        Ok(name)
    }
}
