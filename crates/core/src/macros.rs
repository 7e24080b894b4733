//! Macro definitions and expansion.
//!
//! `[define name($a, $b)]` opens a body that collects the following property
//! rows unresolved. `[use name(x, y)]` binds the parameters, substitutes
//! `{a}` / `{$a}` placeholders in every body value, resolves constants in
//! the result and writes it into the current target.

use crate::constants;
use crate::context::Target;
use crate::document::{Document, Properties};
use crate::error::Fault;
use crate::mask::{Mark, MaskedLine, Pattern};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    name: String,
    params: Vec<String>,
    body: Properties,
}

impl Macro {
    pub fn new(name: String, params: Vec<String>) -> Self {
        Macro {
            name,
            params,
            body: Properties::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, as written (including any `$` sigil).
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Unexpanded body: property key to template.
    pub fn body(&self) -> &Properties {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Properties {
        &mut self.body
    }
}

fn bare(param: &str) -> &str {
    param.strip_prefix('$').unwrap_or(param)
}

/// Register an empty macro. A later definition with the same name replaces
/// the earlier one.
pub(crate) fn define(doc: &mut Document, name: &str, params: Vec<String>) {
    tracing::debug!(name, ?params, "macro defined");
    doc.register_macro(Macro::new(name.to_owned(), params));
}

/// Expand macro `name` into `target`.
pub(crate) fn expand(
    doc: &mut Document,
    target: &Target,
    name: &str,
    args: &[String],
) -> Result<(), Fault> {
    let mac = doc
        .macro_def(name)
        .cloned()
        .ok_or_else(|| Fault::reference(format!("macro {name:?} is not defined")))?;
    let bindings = bind(&mac, args, doc, target)?;
    tracing::debug!(name, ?target, ?bindings, "expanding macro");

    for (key, template) in mac.body() {
        let value = instantiate(template, &bindings, doc)?;
        doc.upsert(target, key, &value);
    }
    Ok(())
}

/// Substitute parameters, then resolve constants, on one mask. Argument
/// text is tagged by the first pass, so the second never looks inside it.
fn instantiate(
    template: &str,
    bindings: &[(String, String)],
    doc: &Document,
) -> Result<String, Fault> {
    let mut line = MaskedLine::new(template, None);
    bind_placeholders(&mut line, bindings);
    constants::resolve(&mut line, doc)?;
    Ok(line.render(&[Mark::Open]))
}

/// Bind parameters to arguments. Bindings are keyed by bare parameter name.
///
/// With zero arguments, each parameter is taken from the same-named property
/// of the target, which is then removed from the target.
fn bind(
    mac: &Macro,
    args: &[String],
    doc: &mut Document,
    target: &Target,
) -> Result<Vec<(String, String)>, Fault> {
    let params = mac.params();
    if args.len() == params.len() {
        return Ok(params
            .iter()
            .zip(args)
            .map(|(p, a)| (bare(p).to_owned(), a.clone()))
            .collect());
    }
    if !args.is_empty() {
        return Err(Fault::arity(format!(
            "macro {:?} expects {} arguments, got {}",
            mac.name(),
            params.len(),
            args.len()
        )));
    }

    let mut found = Vec::with_capacity(params.len());
    for p in params {
        let key = [p.as_str(), bare(p)]
            .into_iter()
            .find(|k| doc.get_in(target, k).is_some())
            .ok_or_else(|| {
                Fault::arity(format!(
                    "macro {:?} expects {} arguments, got 0 and no property {:?} is set",
                    mac.name(),
                    params.len(),
                    bare(p)
                ))
            })?;
        found.push((bare(p).to_owned(), key.to_owned()));
    }

    let mut bindings = Vec::with_capacity(found.len());
    for (param, key) in found {
        if let Some(value) = doc.remove(target, &key) {
            bindings.push((param, value));
        }
    }
    Ok(bindings)
}

/// Replace `{name}` and `{$name}` placeholders whose name is bound.
/// Unbound placeholders pass through unchanged.
pub fn substitute(template: &str, bindings: &[(String, String)]) -> String {
    let mut line = MaskedLine::new(template, None);
    bind_placeholders(&mut line, bindings);
    line.render(&[Mark::Open])
}

fn bind_placeholders(line: &mut MaskedLine, bindings: &[(String, String)]) {
    for l in line.find_all(Pattern::Chars(&['{']), Mark::Open) {
        let r = match line.first_from(l + 1, Pattern::Chars(&['{', '}']), Mark::Open) {
            Some(r) if line.char_at(r) == Some('}') => r,
            _ => continue,
        };
        let name = line.render_range(l + 1, r, &[Mark::Open]);
        let name = bare(name.trim());
        if let Some((_, value)) = bindings.iter().find(|(p, _)| p == name) {
            let value = value.clone();
            line.collapse(l, r, value);
        }
    }
}
