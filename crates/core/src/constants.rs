//! Constant references: `[section:property]`.
//!
//! References resolve against the document parsed so far, narrowest bracket
//! pair first so that nested references compose (`[a:[b:c]]`). Resolution is
//! single-pass: substituted text is never re-scanned.

use crate::document::Document;
use crate::error::Fault;
use crate::mask::{Mark, MaskedLine, Pattern};

/// Resolve every constant in the processable region of `line`.
pub fn resolve(line: &mut MaskedLine, doc: &Document) -> Result<(), Fault> {
    let end = line.end();
    resolve_range(line, 0, end, doc)
}

/// Resolve the constants whose brackets lie inside `from..to`.
pub fn resolve_range(
    line: &mut MaskedLine,
    from: usize,
    to: usize,
    doc: &Document,
) -> Result<(), Fault> {
    let mut pairs: Vec<(usize, usize)> = line
        .pairs('[', ']', Mark::Open)?
        .into_iter()
        .filter(|&(l, r)| l >= from && r < to)
        .collect();
    pairs.sort_by_key(|&(l, r)| (r - l, l));

    for (l, r) in pairs {
        let colon = match line.first_from(l + 1, Pattern::Chars(&[':']), Mark::Open) {
            Some(c) if c < r => c,
            _ => continue,
        };
        let section = line.render_range(l + 1, colon, &[Mark::Open]);
        let property = line.render_range(colon + 1, r, &[Mark::Open]);
        let (section, property) = (section.trim(), property.trim());
        match doc.value(section, property) {
            Some(value) => {
                tracing::trace!(section, property, value, "constant resolved");
                let value = value.to_owned();
                line.collapse(l, r, value);
            }
            None => {
                return Err(Fault::reference(format!(
                    "could not resolve constant [{}:{}] in {:?}",
                    section,
                    property,
                    line.text()
                )))
            }
        }
    }
    Ok(())
}

/// Resolve constants in a standalone string.
pub fn resolve_str(text: &str, doc: &Document) -> Result<String, Fault> {
    let mut line = MaskedLine::new(text, None);
    resolve(&mut line, doc)?;
    Ok(line.render(&[Mark::Open]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use crate::error::ErrorKind;

    fn doc_with(entries: &[(&str, &str, &str)]) -> Document {
        let mut doc = Document::new();
        for (section, key, value) in entries {
            doc.register_section(section);
            doc.upsert(&Target::Section((*section).into()), key, value);
        }
        doc
    }

    #[test]
    fn simple_reference() {
        let doc = doc_with(&[("a", "x", "1")]);
        assert_eq!(resolve_str("[a:x]", &doc).unwrap(), "1");
        assert_eq!(resolve_str("pre-[a:x]-post", &doc).unwrap(), "pre-1-post");
    }

    #[test]
    fn names_are_trimmed() {
        let doc = doc_with(&[("a", "x", "1")]);
        assert_eq!(resolve_str("[ a : x ]", &doc).unwrap(), "1");
    }

    #[test]
    fn nested_reference_resolves_inner_first() {
        let doc = doc_with(&[("a", "x", "host"), ("b", "host", "example.org")]);
        assert_eq!(resolve_str("[b:[a:x]]", &doc).unwrap(), "example.org");
    }

    #[test]
    fn brackets_without_colon_are_untouched() {
        let doc = Document::new();
        assert_eq!(resolve_str("list[0]", &doc).unwrap(), "list[0]");
    }

    #[test]
    fn resolution_is_single_pass() {
        let doc = doc_with(&[("a", "x", "[a:y]"), ("a", "y", "2")]);
        assert_eq!(resolve_str("[a:x]", &doc).unwrap(), "[a:y]");
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let doc = Document::new();
        let err = resolve_str("y=[a:x]", &doc).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Reference);
        assert!(err.message.contains("[a:x]"));
        assert!(err.message.contains("y=[a:x]"));
    }

    #[test]
    fn unbalanced_brackets_are_structural() {
        let doc = Document::new();
        let err = resolve_str("[a:x", &doc).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
    }

    #[test]
    fn range_limits_resolution() {
        let doc = doc_with(&[("a", "x", "1")]);
        let mut line = MaskedLine::new("[a:x] [a:x]", None);
        resolve_range(&mut line, 6, 11, &doc).unwrap();
        assert_eq!(line.render(&[Mark::Open]), "[a:x] 1");
    }
}
