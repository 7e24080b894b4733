//! claimconf-core: parser for a sectioned configuration language with
//! claims-gated sections, constant references, macros, and includes.
//!
//! # Public API
//!
//! - [`load()`] / [`load_with_provider()`] -- parse a file and its includes
//! - [`load_str()`] -- parse in-memory text
//! - [`Document`] -- parsed sections, with [`Section`] and [`Prop`] views
//! - [`LoadOptions`] -- claims, named base paths, conf root
//! - [`ConfError`] -- located parse error; [`ErrorKind`] is its taxonomy
//!
//! ```
//! use claimconf_core::{load_str, LoadOptions};
//!
//! let text = "[db?prod]\nhost=db.internal\n[app]\nurl=pg://[db:host]/app\n";
//! let doc = load_str(text, &LoadOptions::new().with_claim("prod")).unwrap();
//! assert_eq!(doc.value("app", "url"), Some("pg://db.internal/app"));
//! ```

pub mod claims;
pub mod constants;
pub mod context;
pub mod document;
pub mod error;
pub mod loader;
pub mod macros;
pub mod mask;
pub mod row;
pub mod source;

// ── Convenience re-exports: key types ────────────────────────────────

pub use claims::ClaimSet;
pub use context::{BasePaths, LoadOptions};
pub use document::{Document, Prop, Properties, Section};
pub use error::{AccessError, ConfError, ErrorKind};
pub use macros::Macro;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use loader::{load, load_str, load_str_with_provider, load_with_provider};
