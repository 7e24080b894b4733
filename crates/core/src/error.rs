use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy for a parse. Every variant aborts the whole parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed bracket nesting, missing parenthesis, odd quote count,
    /// unrecognized row.
    Structural,
    /// Unresolved constant, undefined macro, unknown base path.
    Reference,
    /// Macro parameter/argument count mismatch.
    Arity,
    /// Mixed `,` and `&` delimiters in one claims clause.
    ClaimSyntax,
    /// File open failure or a required include target that does not exist.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::Reference => "reference",
            ErrorKind::Arity => "arity",
            ErrorKind::ClaimSyntax => "claim syntax",
            ErrorKind::Io => "io",
        };
        f.write_str(label)
    }
}

/// A parse error, located at the offending row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{file}:{line}: {kind} error: {message}")]
pub struct ConfError {
    pub kind: ErrorKind,
    pub file: String,
    /// 1-based line number; 0 when the error is not tied to a row
    /// (for example the root file cannot be opened).
    pub line: u32,
    /// Raw text of the offending row, empty when `line` is 0.
    pub row: String,
    pub message: String,
}

impl ConfError {
    pub fn new(
        kind: ErrorKind,
        file: &str,
        line: u32,
        row: &str,
        message: impl Into<String>,
    ) -> Self {
        ConfError {
            kind,
            file: file.to_owned(),
            line,
            row: row.to_owned(),
            message: message.into(),
        }
    }

    pub fn io(file: &str, message: impl Into<String>) -> Self {
        ConfError::new(ErrorKind::Io, file, 0, "", message)
    }

    /// Serialize to a JSON object with every field present.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "file":    self.file,
            "kind":    self.kind,
            "line":    self.line,
            "message": self.message,
            "row":     self.row,
        })
    }
}

/// An error raised below the row level, before its location is known.
///
/// The row classifier and the scan loop turn it into a [`ConfError`] with
/// [`Fault::at`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::Structural, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::Reference, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::Arity, message)
    }

    pub fn claim_syntax(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::ClaimSyntax, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Fault::new(ErrorKind::Io, message)
    }

    pub fn at(self, file: &str, line: u32, row: &str) -> ConfError {
        ConfError::new(self.kind, file, line, row, self.message)
    }
}

/// Errors from the typed accessor API ([`crate::Prop`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("property {key} does not exist in section [{section}]")]
    Missing { section: String, key: String },

    #[error("property {key} = {value:?} could not be converted: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_location_and_kind() {
        let err = ConfError::new(
            ErrorKind::Reference,
            "app.conf",
            7,
            "y=[a:x]",
            "could not resolve constant [a:x]",
        );
        assert_eq!(
            err.to_string(),
            "app.conf:7: reference error: could not resolve constant [a:x]"
        );
    }

    #[test]
    fn fault_at_attaches_row() {
        let err = Fault::arity("expected 2 arguments, got 1").at("m.conf", 3, "[use m(1)]");
        assert_eq!(err.kind, ErrorKind::Arity);
        assert_eq!(err.line, 3);
        assert_eq!(err.row, "[use m(1)]");
    }

    #[test]
    fn json_value_uses_snake_case_kind() {
        let err = Fault::claim_syntax("mixed").at("c.conf", 1, "[s?a,b&c]");
        let v = err.to_json_value();
        assert_eq!(v["kind"], "claim_syntax");
        assert_eq!(v["line"], 1);
        assert_eq!(v["row"], "[s?a,b&c]");
    }
}
