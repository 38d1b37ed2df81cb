//! Template rendering utilities using Tera
//!
//! Message templates are stored in Jinja style. This module rewrites the
//! Jinja string methods they use into Tera filters and renders templates
//! with consistent error handling.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

/// Text sent in place of a template that cannot be rendered.
pub const RENDER_FAILURE_MESSAGE: &str = "Can't render zulip template message.";

lazy_static! {
    // `name.method()` where method is a Jinja string method with a Tera filter counterpart
    static ref METHOD_CALL: Regex =
        Regex::new(r"([A-Za-z_][A-Za-z0-9_.]*)\.(capitalize|upper|lower|title|strip)\(\)").unwrap();
}

/// Convert Jinja string-method calls to Tera filters
///
/// Handles:
/// - `{{ status.capitalize() }}` -> `{{ status | capitalize }}`
/// - `upper()`, `lower()`, `title()` -> the filter of the same name
/// - `strip()` -> `trim`
pub fn convert_jinja_to_tera(template: &str) -> String {
    METHOD_CALL
        .replace_all(template, |caps: &regex::Captures| {
            let filter = match &caps[2] {
                "strip" => "trim",
                other => other,
            };
            format!("{} | {}", &caps[1], filter)
        })
        .into_owned()
}

/// Render a template string with the given context
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    let converted_template = convert_jinja_to_tera(template);

    let mut tera = Tera::default();
    tera.add_raw_template("template", &converted_template)
        .map_err(|e| Error::Template(format!("Failed to parse template: {}", e)))?;

    let mut tera_context = Context::new();
    match context {
        Value::Object(map) => {
            for (key, value) in map {
                tera_context.insert(key, &value);
            }
        }
        _ => {
            tera_context.insert("data", &context);
        }
    }

    tera.render("template", &tera_context)
        .map_err(|e| Error::Template(format!("Failed to render template: {}", e)))
}

/// Render a template, substituting [`RENDER_FAILURE_MESSAGE`] for any error.
pub fn render_or_placeholder(template: &str, context: &Value) -> String {
    render_template(template, context).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        RENDER_FAILURE_MESSAGE.to_string()
    })
}
