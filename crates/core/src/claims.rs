//! Conditional section clauses.
//!
//! A header may carry `?expr` where `expr` joins claim tokens uniformly with
//! `,` (any one suffices) or `&` (all are required). Tokens may be constant
//! references; they are resolved before evaluation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::document::Document;
use crate::error::Fault;
use crate::mask::{Mark, MaskedLine, Pattern};

/// The claims held by a parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeSet<String>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim; surrounding whitespace is not significant.
    pub fn insert(&mut self, claim: impl Into<String>) -> bool {
        let claim: String = claim.into();
        self.0.insert(claim.trim().to_owned())
    }

    pub fn contains(&self, claim: &str) -> bool {
        self.0.contains(claim)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ClaimSet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ClaimSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for claim in iter {
            self.insert(claim);
        }
    }
}

/// How the tokens of one clause combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Junction {
    Any,
    All,
}

/// Evaluate the clause occupying `from..to` of `line` (the text after `?`).
///
/// The clause positions are consumed: on return they are all marked
/// [`Mark::Hidden`], so the rest of the header renders without them.
pub fn evaluate(
    line: &mut MaskedLine,
    from: usize,
    to: usize,
    doc: &Document,
    held: &ClaimSet,
) -> Result<bool, Fault> {
    constants::resolve_range(line, from, to, doc)?;

    let in_clause = |positions: Vec<usize>| -> Vec<usize> {
        positions
            .into_iter()
            .filter(|&p| p >= from && p < to)
            .collect()
    };
    let ors = in_clause(line.find_all(Pattern::Chars(&[',']), Mark::Open));
    let ands = in_clause(line.find_all(Pattern::Chars(&['&']), Mark::Open));
    if !ors.is_empty() && !ands.is_empty() {
        return Err(Fault::claim_syntax(format!(
            "claims clause mixes ',' and '&': {:?}",
            line.text()
        )));
    }
    let junction = if ands.is_empty() {
        Junction::Any
    } else {
        Junction::All
    };
    for pos in ors.into_iter().chain(ands) {
        line.set_mark(pos, Mark::Delimiter);
    }

    let tokens: Vec<String> = line
        .render_segments(from, to, &[Mark::Open])
        .into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect();
    line.mark_span(from, to, Mark::Hidden);

    if tokens.is_empty() {
        return Ok(true);
    }
    let granted = match junction {
        Junction::All => tokens.iter().all(|t| held.contains(t)),
        Junction::Any => tokens.iter().any(|t| held.contains(t)),
    };
    tracing::trace!(?tokens, ?junction, granted, "claims clause evaluated");
    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;

    fn eval(clause: &str, held: &[&str]) -> Result<bool, Fault> {
        let doc = Document::new();
        eval_in(&doc, clause, held)
    }

    fn eval_in(doc: &Document, clause: &str, held: &[&str]) -> Result<bool, Fault> {
        let mut line = MaskedLine::new(clause, None);
        let end = line.end();
        let held: ClaimSet = held.iter().copied().collect();
        evaluate(&mut line, 0, end, doc, &held)
    }

    #[test]
    fn single_claim() {
        assert!(eval("prod", &["prod"]).unwrap());
        assert!(!eval("dev", &["prod"]).unwrap());
    }

    #[test]
    fn or_grants_on_any_match() {
        assert!(eval("dev, prod", &["prod"]).unwrap());
        assert!(!eval("dev,test", &["prod"]).unwrap());
    }

    #[test]
    fn and_requires_every_token() {
        assert!(eval("prod&eu", &["prod", "eu"]).unwrap());
        assert!(!eval("prod & eu", &["prod"]).unwrap());
    }

    #[test]
    fn empty_clause_grants() {
        assert!(eval("", &[]).unwrap());
        assert!(eval("  ", &["x"]).unwrap());
    }

    #[test]
    fn mixed_delimiters_are_rejected() {
        let err = eval("a,b&c", &["a"]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ClaimSyntax);
    }

    #[test]
    fn tokens_may_be_constants() {
        let mut doc = Document::new();
        let target = Target::Section("env".into());
        doc.register_section("env");
        doc.upsert(&target, "role", "prod");
        assert!(eval_in(&doc, "[env:role]", &["prod"]).unwrap());
        assert!(!eval_in(&doc, "[env:role]", &["dev"]).unwrap());
    }

    #[test]
    fn unresolved_constant_is_fatal() {
        let err = eval("[env:role]", &["prod"]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Reference);
    }

    #[test]
    fn claim_set_from_iter_and_extend() {
        let mut set: ClaimSet = ["a", "b"].into_iter().collect();
        set.extend(vec![String::from("c")]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
