//! `$(name)` interpolation for path and link templates.
//!
//! ```text
//! "$(year)/$(basename)$(outExt)"  ->  "2024/hello-world.html"
//! ```
//!
//! Names may be dotted paths into entry fields (`$(author.slug)`).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::PipelineError;
use crate::util::value_to_string;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\((.+?)\)").expect("valid placeholder regex"));

/// Replace every `$(name)` in `template` with the value `resolve` returns.
///
/// Scalars are inserted as plain text, composite values as JSON.
/// A name that resolves to nothing (or to `null`) is an error.
pub fn interpolate<F>(template: &str, resolve: F) -> Result<String, PipelineError>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let key = name.as_str().trim();
        let value = resolve(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| PipelineError::Placeholder {
                key: key.to_string(),
                template: template.to_string(),
            })?;

        out.push_str(&template[last..whole.start()]);
        match value_to_string(&value) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&value.to_string()),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolver(key: &str) -> Option<Value> {
        match key {
            "basename" => Some(json!("hello")),
            "outExt" => Some(json!(".html")),
            "year" => Some(json!(2024)),
            "tags" => Some(json!(["a", "b"])),
            "nothing" => Some(Value::Null),
            _ => None,
        }
    }

    #[test]
    fn test_interpolate_scalars() {
        let out = interpolate("$(year)/$(basename)$(outExt)", resolver).unwrap();
        assert_eq!(out, "2024/hello.html");
    }

    #[test]
    fn test_interpolate_without_placeholders() {
        assert_eq!(interpolate("static/index.html", resolver).unwrap(), "static/index.html");
    }

    #[test]
    fn test_interpolate_trims_names_and_serializes_composites() {
        assert_eq!(interpolate("$( basename )-$(tags)", resolver).unwrap(), "hello-[\"a\",\"b\"]");
    }

    #[test]
    fn test_interpolate_missing_key() {
        let err = interpolate("$(basename)/$(missing)", resolver).unwrap_err();
        assert!(matches!(err, PipelineError::Placeholder { ref key, .. } if key == "missing"));

        let err = interpolate("$(nothing)", resolver).unwrap_err();
        assert!(matches!(err, PipelineError::Placeholder { ref key, .. } if key == "nothing"));
    }
}
