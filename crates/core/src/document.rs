//! The parsed document and its read-only accessor views.
//!
//! Sections keep first-seen order. Properties that appear before the first
//! header belong to the unnamed section `""`, which can be read but is never
//! enumerated.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::context::Target;
use crate::error::AccessError;
use crate::macros::Macro;

pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct Document {
    section_names: Vec<String>,
    sections: HashMap<String, Properties>,
    macros: HashMap<String, Macro>,
    files: Vec<PathBuf>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation (parser only) ───────────────────────────────────────────

    /// Record a section header. The name keeps the position of its first
    /// occurrence.
    pub(crate) fn register_section(&mut self, name: &str) {
        self.sections.entry(name.to_owned()).or_default();
        if !name.is_empty() && !self.section_names.iter().any(|n| n == name) {
            self.section_names.push(name.to_owned());
        }
    }

    pub(crate) fn register_macro(&mut self, mac: Macro) {
        self.macros.insert(mac.name().to_owned(), mac);
    }

    pub(crate) fn add_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    fn target_mut(&mut self, target: &Target) -> &mut Properties {
        match target {
            Target::Section(name) => self.sections.entry(name.clone()).or_default(),
            Target::Macro(name) => self
                .macros
                .entry(name.clone())
                .or_insert_with(|| Macro::new(name.clone(), Vec::new()))
                .body_mut(),
        }
    }

    fn target_ref(&self, target: &Target) -> Option<&Properties> {
        match target {
            Target::Section(name) => self.sections.get(name),
            Target::Macro(name) => self.macros.get(name).map(Macro::body),
        }
    }

    /// Set `key`, overwriting any previous value.
    pub(crate) fn upsert(&mut self, target: &Target, key: &str, value: &str) {
        self.target_mut(target)
            .insert(key.to_owned(), value.to_owned());
    }

    /// Concatenate `fragment` directly onto the value of `key`.
    pub(crate) fn append(&mut self, target: &Target, key: &str, fragment: &str) {
        self.target_mut(target)
            .entry(key.to_owned())
            .or_default()
            .push_str(fragment);
    }

    /// Concatenate `fragment` onto the value of `key`, newline-separated.
    pub(crate) fn append_line(&mut self, target: &Target, key: &str, fragment: &str) {
        let value = self.target_mut(target).entry(key.to_owned()).or_default();
        value.push('\n');
        value.push_str(fragment);
    }

    pub(crate) fn remove(&mut self, target: &Target, key: &str) -> Option<String> {
        self.target_mut(target).remove(key)
    }

    pub(crate) fn get_in(&self, target: &Target, key: &str) -> Option<&str> {
        self.target_ref(target)
            .and_then(|props| props.get(key))
            .map(String::as_str)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Section names in first-seen order.
    pub fn section_names(&self) -> &[String] {
        &self.section_names
    }

    pub fn section(&self, name: &str) -> Section<'_> {
        Section {
            doc: self,
            name: name.to_owned(),
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = Section<'_>> {
        self.section_names.iter().map(|name| self.section(name))
    }

    pub fn properties(&self, section: &str) -> Option<&Properties> {
        self.sections.get(section)
    }

    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|props| props.get(key))
            .map(String::as_str)
    }

    pub fn prop(&self, section: &str, key: &str) -> Prop<'_> {
        Prop {
            section: section.to_owned(),
            name: key.to_owned(),
            value: self.value(section, key),
        }
    }

    pub fn prop_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.value(section, key).unwrap_or(default)
    }

    pub fn macro_def(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    /// Files read by the parse, in the order they were opened.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The root file of the parse.
    pub fn conf_file(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        let sections: Vec<serde_json::Value> = self
            .section_names
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "properties": self.sections.get(name).cloned().unwrap_or_default(),
                })
            })
            .collect();
        let mut out = serde_json::json!({
            "sections": sections,
            "files": self.files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
        });
        if let Some(unnamed) = self.sections.get("").filter(|p| !p.is_empty()) {
            out["unnamed"] = serde_json::json!(unnamed);
        }
        out
    }
}

/// Renders the document back into configuration syntax.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(unnamed) = self.sections.get("").filter(|p| !p.is_empty()) {
            write_properties(f, unnamed)?;
            first = false;
        }
        for name in &self.section_names {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "[{name}]")?;
            if let Some(props) = self.sections.get(name) {
                write_properties(f, props)?;
            }
        }
        Ok(())
    }
}

fn write_properties(f: &mut fmt::Formatter<'_>, props: &Properties) -> fmt::Result {
    for (key, value) in props {
        if value.contains('\n') {
            writeln!(f, "{key}=<<EOT\n{value}\nEOT")?;
        } else {
            writeln!(f, "{key}={value}")?;
        }
    }
    Ok(())
}

// ── Views ────────────────────────────────────────────────────────────────────

/// A named section, which may or may not exist.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    doc: &'a Document,
    name: String,
}

impl<'a> Section<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.doc.sections.contains_key(&self.name)
    }

    /// Position in [`Document::section_names`].
    pub fn index(&self) -> Option<usize> {
        self.doc.section_names.iter().position(|n| *n == self.name)
    }

    pub fn prop_val(&self, key: &str) -> Option<&'a str> {
        self.doc.value(&self.name, key)
    }

    pub fn prop_or(&self, key: &str, default: &'a str) -> &'a str {
        self.prop_val(key).unwrap_or(default)
    }

    pub fn prop(&self, key: &str) -> Prop<'a> {
        self.doc.prop(&self.name, key)
    }

    pub fn properties(&self) -> Option<&'a Properties> {
        self.doc.properties(&self.name)
    }
}

/// A single property lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prop<'a> {
    section: String,
    name: String,
    value: Option<&'a str>,
}

impl<'a> Prop<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Result<&'a str, AccessError> {
        self.value.ok_or_else(|| self.missing())
    }

    pub fn value_or(&self, default: &'a str) -> &'a str {
        self.value.unwrap_or(default)
    }

    /// Convert the value with [`FromStr`].
    pub fn parse<T>(&self) -> Result<T, AccessError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.value()?;
        raw.trim().parse().map_err(|e: T::Err| AccessError::Invalid {
            key: self.name.clone(),
            value: raw.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Like [`parse`](Self::parse), but an absent property yields `default`.
    pub fn parse_or<T>(&self, default: T) -> Result<T, AccessError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.exists() {
            self.parse()
        } else {
            Ok(default)
        }
    }

    fn missing(&self) -> AccessError {
        AccessError::Missing {
            section: self.section.clone(),
            key: self.name.clone(),
        }
    }
}
