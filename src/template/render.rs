//! Strict text rendering.

use std::fmt::Write;

use minijinja::value::{Value as TemplateValue, ValueKind};
use minijinja::{escape_formatter, Environment, ErrorKind, Output, State, UndefinedBehavior};
use serde_json::{Map, Value};
use thiserror::Error;

/// Placeholder sentinels from templates written before data-driven rendering.
pub const LEGACY_PLACEHOLDERS: [&str; 2] = ["{APP_URL}", "{:RECORD_ID}"];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("error executing text template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("rendered with unresolved legacy placeholder {0}")]
    LegacyPlaceholder(&'static str),
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_formatter(format_value);
    env
}

/// Booleans print as `true`/`false`; everything else uses the default.
fn format_value(
    out: &mut Output,
    state: &State,
    value: &TemplateValue,
) -> Result<(), minijinja::Error> {
    if value.kind() == ValueKind::Bool {
        return out
            .write_str(if value.is_true() { "true" } else { "false" })
            .map_err(|_| minijinja::Error::new(ErrorKind::WriteFailure, "failed to write value"));
    }
    escape_formatter(out, state, value)
}

/// Render `body` against `variables`.
///
/// Referencing a variable that is not in `variables` is an error, and so is
/// output that still contains a legacy sentinel.
pub fn render_text(body: &str, variables: &Map<String, Value>) -> Result<String, RenderError> {
    let text = environment().render_str(body, variables)?;
    if let Some(placeholder) = find_legacy_placeholder(&text) {
        return Err(RenderError::LegacyPlaceholder(placeholder));
    }
    Ok(text)
}

/// First legacy sentinel present in `text`, if any.
pub fn find_legacy_placeholder(text: &str) -> Option<&'static str> {
    LEGACY_PLACEHOLDERS
        .iter()
        .copied()
        .find(|placeholder| text.contains(placeholder))
}
