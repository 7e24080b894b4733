//! Masked line buffer: the tokenization substrate of the parser.
//!
//! A [`MaskedLine`] keeps the characters of one physical line immutable and
//! layers a same-length classification sequence plus a sparse tag table on
//! top of it. Every classifier pass (comment detection, header syntax,
//! constant resolution, macro placeholders) only rewrites marks and tags, so
//! passes compose without re-lexing the source text.

use std::collections::HashMap;

use crate::error::Fault;

/// Classification of a single character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// Not yet claimed by any pass; passes through on render.
    Open,
    /// Whitespace trimmed away.
    Blank,
    /// Part of the trailing comment region.
    Comment,
    /// Syntax consumed by a classifier (brackets, `=`, quotes, keywords).
    Hidden,
    /// Carries a tag; renders as the tag text.
    Resolved,
    /// Segment separator for [`MaskedLine::render_segments`].
    Delimiter,
    /// Protected by quotation marks.
    Quoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Character pattern for [`MaskedLine::scan`].
#[derive(Debug, Clone, Copy)]
pub enum Pattern<'a> {
    Any,
    Chars(&'a [char]),
    Whitespace,
}

impl Pattern<'_> {
    fn matches(&self, c: char) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Chars(set) => set.contains(&c),
            Pattern::Whitespace => c.is_whitespace(),
        }
    }
}

/// No limit on hits or consecutive misses.
pub const UNBOUNDED: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskError {
    /// A delimiter has no partner; `missing` names the absent side.
    #[error("missing '{missing}' in {text:?}")]
    Unbalanced { missing: char, text: String },
}

impl From<MaskError> for Fault {
    fn from(e: MaskError) -> Self {
        Fault::structural(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MaskedLine {
    chars: Vec<char>,
    marks: Vec<Mark>,
    tags: HashMap<usize, String>,
    comment: Option<usize>,
}

impl MaskedLine {
    /// Wrap `text`. When `comment` is given, everything from its first
    /// occurrence onward is marked [`Mark::Comment`] and excluded from all
    /// later scans and renders.
    pub fn new(text: &str, comment: Option<char>) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut marks = vec![Mark::Open; chars.len()];
        let start = comment.and_then(|marker| chars.iter().position(|&c| c == marker));
        if let Some(start) = start {
            for m in &mut marks[start..] {
                *m = Mark::Comment;
            }
        }
        MaskedLine {
            chars,
            marks,
            tags: HashMap::new(),
            comment: start,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Position of the comment marker, if the line has one.
    pub fn comment(&self) -> Option<usize> {
        self.comment
    }

    /// Exclusive end of the processable region.
    pub fn end(&self) -> usize {
        self.comment.unwrap_or(self.chars.len())
    }

    /// The original, unmodified text.
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).copied()
    }

    pub fn mark(&self, pos: usize) -> Option<Mark> {
        self.marks.get(pos).copied()
    }

    // ── Scanning ─────────────────────────────────────────────────────────

    /// Walk from `from` in `dir`, collecting positions whose character
    /// matches `pattern` and whose mark equals `want`. Stops after
    /// `max_hits` matches or `max_misses` consecutive non-matches.
    pub fn scan(
        &self,
        from: usize,
        dir: Direction,
        max_hits: usize,
        max_misses: usize,
        pattern: Pattern<'_>,
        want: Mark,
    ) -> Vec<usize> {
        let end = self.end();
        let mut hits = Vec::new();
        if max_hits == 0 || from >= end {
            return hits;
        }
        let mut misses = 0;
        let mut pos = from;
        loop {
            if self.marks[pos] == want && pattern.matches(self.chars[pos]) {
                hits.push(pos);
                misses = 0;
                if hits.len() >= max_hits {
                    break;
                }
            } else {
                misses += 1;
                if misses >= max_misses {
                    break;
                }
            }
            match dir {
                Direction::Forward => {
                    pos += 1;
                    if pos >= end {
                        break;
                    }
                }
                Direction::Backward => {
                    if pos == 0 {
                        break;
                    }
                    pos -= 1;
                }
            }
        }
        hits
    }

    pub fn first(&self, pattern: Pattern<'_>, want: Mark) -> Option<usize> {
        self.first_from(0, pattern, want)
    }

    pub fn first_from(&self, from: usize, pattern: Pattern<'_>, want: Mark) -> Option<usize> {
        self.scan(from, Direction::Forward, 1, UNBOUNDED, pattern, want)
            .first()
            .copied()
    }

    pub fn last(&self, pattern: Pattern<'_>, want: Mark) -> Option<usize> {
        let end = self.end();
        if end == 0 {
            return None;
        }
        self.scan(end - 1, Direction::Backward, 1, UNBOUNDED, pattern, want)
            .first()
            .copied()
    }

    pub fn find_all(&self, pattern: Pattern<'_>, want: Mark) -> Vec<usize> {
        self.scan(0, Direction::Forward, UNBOUNDED, UNBOUNDED, pattern, want)
    }

    // ── Masking ──────────────────────────────────────────────────────────

    pub fn set_mark(&mut self, pos: usize, mark: Mark) {
        if let Some(m) = self.marks.get_mut(pos) {
            *m = mark;
        }
    }

    /// Overwrite the marks in `from..to`.
    pub fn mark_span(&mut self, from: usize, to: usize, mark: Mark) {
        let to = to.min(self.marks.len());
        for pos in from..to {
            self.marks[pos] = mark;
        }
    }

    /// Mark the first occurrence of `c` carrying `want`.
    pub fn mark_first(&mut self, c: char, mark: Mark, want: Mark) -> Option<usize> {
        let pos = self.first(Pattern::Chars(&[c]), want)?;
        self.marks[pos] = mark;
        Some(pos)
    }

    pub fn mark_last(&mut self, c: char, mark: Mark, want: Mark) -> Option<usize> {
        let pos = self.last(Pattern::Chars(&[c]), want)?;
        self.marks[pos] = mark;
        Some(pos)
    }

    pub fn mark_all(&mut self, c: char, mark: Mark, want: Mark) -> Vec<usize> {
        let hits = self.find_all(Pattern::Chars(&[c]), want);
        for &pos in &hits {
            self.marks[pos] = mark;
        }
        hits
    }

    /// Mark the whitespace run starting at `pos` and extending in `dir`.
    pub fn mark_whitespace_run(&mut self, pos: usize, dir: Direction, mark: Mark, want: Mark) {
        let run = self.scan(pos, dir, UNBOUNDED, 1, Pattern::Whitespace, want);
        for p in run {
            self.marks[p] = mark;
        }
    }

    /// Trim leading and trailing whitespace of the processable region.
    pub fn trim_ends(&mut self, mark: Mark, want: Mark) {
        let end = self.end();
        if end == 0 {
            return;
        }
        self.mark_whitespace_run(0, Direction::Forward, mark, want);
        self.mark_whitespace_run(end - 1, Direction::Backward, mark, want);
    }

    /// Trim whitespace on both sides of `pos`.
    pub fn trim_around(&mut self, pos: usize, mark: Mark, want: Mark) {
        if pos > 0 {
            self.mark_whitespace_run(pos - 1, Direction::Backward, mark, want);
        }
        self.mark_whitespace_run(pos + 1, Direction::Forward, mark, want);
    }

    /// If the first `want` character starts `word`, mark the word and
    /// return the position just past it.
    pub fn mark_prefix(&mut self, word: &str, mark: Mark, want: Mark) -> Option<usize> {
        let start = self.first(Pattern::Any, want)?;
        let mut pos = start;
        for w in word.chars() {
            if pos >= self.end() || self.chars[pos] != w || self.marks[pos] != want {
                return None;
            }
            pos += 1;
        }
        self.mark_span(start, pos, mark);
        Some(pos)
    }

    /// Match `left`/`right` pairs among positions carrying `want`, partnering
    /// each right delimiter with its innermost open left one.
    pub fn pairs(
        &self,
        left: char,
        right: char,
        want: Mark,
    ) -> Result<Vec<(usize, usize)>, MaskError> {
        let mut open = Vec::new();
        let mut pairs = Vec::new();
        for pos in 0..self.end() {
            if self.marks[pos] != want {
                continue;
            }
            let c = self.chars[pos];
            if c == left {
                open.push(pos);
            } else if c == right {
                match open.pop() {
                    Some(l) => pairs.push((l, pos)),
                    None => {
                        return Err(MaskError::Unbalanced {
                            missing: left,
                            text: self.text(),
                        })
                    }
                }
            }
        }
        if !open.is_empty() {
            return Err(MaskError::Unbalanced {
                missing: right,
                text: self.text(),
            });
        }
        Ok(pairs)
    }

    // ── Tags and rendering ───────────────────────────────────────────────

    /// Attach replacement text at `pos`.
    pub fn tag(&mut self, pos: usize, text: impl Into<String>) {
        if pos < self.marks.len() {
            self.marks[pos] = Mark::Resolved;
            self.tags.insert(pos, text.into());
        }
    }

    /// Collapse the inclusive span `from..=to` into a single tagged position.
    pub fn collapse(&mut self, from: usize, to: usize, text: impl Into<String>) {
        self.mark_span(from, to + 1, Mark::Hidden);
        self.tag(from, text);
    }

    pub fn render(&self, pass: &[Mark]) -> String {
        self.render_range(0, self.end(), pass)
    }

    /// Concatenate tag text at resolved positions and the original character
    /// wherever the mark is in `pass`.
    pub fn render_range(&self, from: usize, to: usize, pass: &[Mark]) -> String {
        let mut out = String::new();
        for pos in from..to.min(self.end()) {
            self.render_at(pos, pass, &mut out);
        }
        out
    }

    /// Like [`render_range`](Self::render_range), but every
    /// [`Mark::Delimiter`] position closes the current segment.
    pub fn render_segments(&self, from: usize, to: usize, pass: &[Mark]) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        for pos in from..to.min(self.end()) {
            if self.marks[pos] == Mark::Delimiter {
                segments.push(std::mem::take(&mut current));
            } else {
                self.render_at(pos, pass, &mut current);
            }
        }
        segments.push(current);
        segments
    }

    fn render_at(&self, pos: usize, pass: &[Mark], out: &mut String) {
        let mark = self.marks[pos];
        if mark == Mark::Resolved {
            if let Some(text) = self.tags.get(&pos) {
                out.push_str(text);
            }
        } else if pass.contains(&mark) {
            out.push(self.chars[pos]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &[Mark] = &[Mark::Open];

    #[test]
    fn comment_region_is_excluded() {
        let line = MaskedLine::new("key=value # note", Some('#'));
        assert_eq!(line.comment(), Some(10));
        assert_eq!(line.end(), 10);
        assert_eq!(line.render(OPEN), "key=value ");
        assert_eq!(line.mark(12), Some(Mark::Comment));
    }

    #[test]
    fn no_comment_marker_keeps_hash() {
        let line = MaskedLine::new("a#b", None);
        assert_eq!(line.comment(), None);
        assert_eq!(line.render(OPEN), "a#b");
    }

    #[test]
    fn scan_stops_after_hits() {
        let line = MaskedLine::new("a,b,c,d", None);
        let hits = line.scan(0, Direction::Forward, 2, UNBOUNDED, Pattern::Chars(&[',']), Mark::Open);
        assert_eq!(hits, vec![1, 3]);
    }

    #[test]
    fn scan_stops_after_consecutive_misses() {
        let line = MaskedLine::new("   x  ", None);
        let run = line.scan(0, Direction::Forward, UNBOUNDED, 1, Pattern::Whitespace, Mark::Open);
        assert_eq!(run, vec![0, 1, 2]);
        let back = line.scan(5, Direction::Backward, UNBOUNDED, 1, Pattern::Whitespace, Mark::Open);
        assert_eq!(back, vec![5, 4]);
    }

    #[test]
    fn scan_respects_marks() {
        let mut line = MaskedLine::new("a=b=c", None);
        line.set_mark(1, Mark::Hidden);
        assert_eq!(line.first(Pattern::Chars(&['=']), Mark::Open), Some(3));
        assert_eq!(line.last(Pattern::Any, Mark::Hidden), Some(1));
    }

    #[test]
    fn trim_ends_and_around() {
        let mut line = MaskedLine::new("  key = value  ", None);
        line.trim_ends(Mark::Blank, Mark::Open);
        let eq = line.mark_first('=', Mark::Hidden, Mark::Open).unwrap();
        line.trim_around(eq, Mark::Blank, Mark::Open);
        assert_eq!(line.render(OPEN), "keyvalue");
        assert_eq!(line.render_range(0, eq, OPEN), "key");
    }

    #[test]
    fn mark_prefix_requires_exact_word() {
        let mut line = MaskedLine::new("define m(x)", None);
        assert_eq!(line.mark_prefix("use ", Mark::Hidden, Mark::Open), None);
        assert_eq!(line.mark_prefix("define ", Mark::Hidden, Mark::Open), Some(7));
        assert_eq!(line.render(OPEN), "m(x)");
    }

    #[test]
    fn pairs_resolve_innermost_first() {
        let line = MaskedLine::new("[a:[b:c]]", None);
        let pairs = line.pairs('[', ']', Mark::Open).unwrap();
        assert_eq!(pairs, vec![(3, 7), (0, 8)]);
    }

    #[test]
    fn pairs_report_missing_side() {
        let line = MaskedLine::new("x=[a:b", None);
        assert_eq!(
            line.pairs('[', ']', Mark::Open),
            Err(MaskError::Unbalanced {
                missing: ']',
                text: "x=[a:b".into()
            })
        );
        let line = MaskedLine::new("x=a]", None);
        assert!(matches!(
            line.pairs('[', ']', Mark::Open),
            Err(MaskError::Unbalanced { missing: '[', .. })
        ));
    }

    #[test]
    fn collapse_renders_tag_once() {
        let mut line = MaskedLine::new("v=[a:x]!", None);
        line.collapse(2, 6, "42");
        assert_eq!(line.render(OPEN), "v=42!");
        assert_eq!(line.text(), "v=[a:x]!");
    }

    #[test]
    fn segments_split_on_delimiters() {
        let mut line = MaskedLine::new("a, b,,c", None);
        line.mark_all(',', Mark::Delimiter, Mark::Open);
        assert_eq!(line.render_segments(0, line.end(), OPEN), vec!["a", " b", "", "c"]);
    }

    #[test]
    fn quoted_marks_render_only_when_asked() {
        let mut line = MaskedLine::new("\"x\"", None);
        line.set_mark(0, Mark::Hidden);
        line.set_mark(1, Mark::Quoted);
        line.set_mark(2, Mark::Hidden);
        assert_eq!(line.render(OPEN), "");
        assert_eq!(line.render(&[Mark::Open, Mark::Quoted]), "x");
    }
}
