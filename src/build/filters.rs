//! Template helper filters.
//!
//! Registered on every template stage's engine:
//!
//! | filter           | example                                        |
//! |------------------|------------------------------------------------|
//! | `head`           | `{{ posts \| head(count=3) }}`                 |
//! | `tail`           | `{{ posts \| tail(count=3) }}`                 |
//! | `sort_by`        | `{{ posts \| sort_by(attribute="date", reverse=true) }}` |
//! | `having`         | `{{ posts \| having(attribute="featured") }}`  |
//! | `alt`            | `{% if loop.index \| alt %}`                   |
//! | `page_slice`     | `{{ posts \| page_slice(page=2, page_size=10) }}` |
//! | `truncate`       | `{{ summary \| truncate(length=80) }}`         |
//! | `json_stringify` | `{{ page \| json_stringify }}`                 |

use std::collections::HashMap;

use serde_json::Value;
use tera::Tera;

use crate::util::{compare_values, loose_eq};

type Args = HashMap<String, Value>;

/// Register every helper filter on `tera`.
pub fn register(tera: &mut Tera) {
    tera.register_filter("head", head);
    tera.register_filter("tail", tail);
    tera.register_filter("sort_by", sort_by);
    tera.register_filter("having", having);
    tera.register_filter("alt", alt);
    tera.register_filter("page_slice", page_slice);
    tera.register_filter("truncate", truncate);
    tera.register_filter("json_stringify", json_stringify);
}

/// The first `count` items (default 1).
pub fn head(value: &Value, args: &Args) -> tera::Result<Value> {
    let items = array(value, "head")?;
    let count = usize_arg(args, "count", "head")?.unwrap_or(1);
    Ok(Value::Array(items.iter().take(count).cloned().collect()))
}

/// The last `count` items (default 1).
pub fn tail(value: &Value, args: &Args) -> tera::Result<Value> {
    let items = array(value, "tail")?;
    let count = usize_arg(args, "count", "tail")?.unwrap_or(1);
    let start = items.len().saturating_sub(count);
    Ok(Value::Array(items[start..].to_vec()))
}

/// Stable sort by a (dotted) attribute, optionally reversed.
pub fn sort_by(value: &Value, args: &Args) -> tera::Result<Value> {
    let mut items = array(value, "sort_by")?.clone();
    let attribute = str_arg(args, "attribute", "sort_by")?;
    let reverse = args.get("reverse").and_then(Value::as_bool).unwrap_or(false);

    items.sort_by(|a, b| compare_values(attr(a, attribute), attr(b, attribute)));
    if reverse {
        items.reverse();
    }
    Ok(Value::Array(items))
}

/// Items that have `attribute`, or whose `attribute` loosely equals `value`.
pub fn having(value: &Value, args: &Args) -> tera::Result<Value> {
    let items = array(value, "having")?;
    let attribute = str_arg(args, "attribute", "having")?;
    let expected = args.get("value");

    let kept = items
        .iter()
        .filter(|item| match (attr(item, attribute), expected) {
            (Some(actual), Some(expected)) => loose_eq(actual, expected),
            (Some(_), None) => true,
            (None, _) => false,
        })
        .cloned()
        .collect();
    Ok(Value::Array(kept))
}

/// True for even numbers.
pub fn alt(value: &Value, _args: &Args) -> tera::Result<Value> {
    let n = value
        .as_f64()
        .ok_or_else(|| tera::Error::msg("filter `alt` expects a number"))?;
    Ok(Value::Bool(n % 2.0 == 0.0))
}

/// The items of a 1-based page of `page_size` items.
pub fn page_slice(value: &Value, args: &Args) -> tera::Result<Value> {
    let items = array(value, "page_slice")?;
    let page = usize_arg(args, "page", "page_slice")?
        .ok_or_else(|| tera::Error::msg("filter `page_slice` requires `page`"))?;
    let page_size = usize_arg(args, "page_size", "page_slice")?
        .ok_or_else(|| tera::Error::msg("filter `page_slice` requires `page_size`"))?;

    let start = page.saturating_sub(1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    Ok(Value::Array(items[start..end].to_vec()))
}

/// Cut a string to `length` characters, appending `ellipsis` (default "...")
/// when something was removed.
pub fn truncate(value: &Value, args: &Args) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("filter `truncate` expects a string"))?;
    let length = usize_arg(args, "length", "truncate")?
        .ok_or_else(|| tera::Error::msg("filter `truncate` requires `length`"))?;
    let ellipsis = args.get("ellipsis").and_then(Value::as_str).unwrap_or("...");

    if text.chars().count() > length {
        let cut: String = text.chars().take(length).collect();
        Ok(Value::String(cut + ellipsis))
    } else {
        Ok(Value::String(text.to_string()))
    }
}

/// Serialize any value as JSON text.
pub fn json_stringify(value: &Value, _args: &Args) -> tera::Result<Value> {
    serde_json::to_string(value)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(format!("filter `json_stringify` failed: {e}")))
}

fn array<'a>(value: &'a Value, filter: &str) -> tera::Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| tera::Error::msg(format!("filter `{filter}` expects an array")))
}

fn usize_arg(args: &Args, name: &str, filter: &str) -> tera::Result<Option<usize>> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                tera::Error::msg(format!(
                    "filter `{filter}`: `{name}` must be a non-negative integer"
                ))
            }),
    }
}

fn str_arg<'a>(args: &'a Args, name: &str, filter: &str) -> tera::Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg(format!("filter `{filter}` requires `{name}`")))
}

fn attr<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(item, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tera::Context;

    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Args {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_head_and_tail() {
        let list = json!([1, 2, 3, 4]);
        assert_eq!(head(&list, &args(&[("count", json!(2))])).unwrap(), json!([1, 2]));
        assert_eq!(tail(&list, &args(&[("count", json!(3))])).unwrap(), json!([2, 3, 4]));
        assert_eq!(head(&list, &Args::new()).unwrap(), json!([1]));
        assert_eq!(tail(&list, &args(&[("count", json!(10))])).unwrap(), list);
    }

    #[test]
    fn test_sort_by_with_reverse() {
        let list = json!([{"n": 2, "id": "b"}, {"n": 1, "id": "a"}, {"id": "x"}, {"n": 3, "id": "c"}]);
        let sorted = sort_by(&list, &args(&[("attribute", json!("n"))])).unwrap();
        let ids: Vec<_> = sorted.as_array().unwrap().iter().map(|v| v["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b"), json!("c"), json!("x")]);

        let reversed = sort_by(
            &list,
            &args(&[("attribute", json!("n")), ("reverse", json!(true))]),
        )
        .unwrap();
        assert_eq!(reversed[0]["id"], json!("x"));
        assert_eq!(reversed[1]["id"], json!("c"));
    }

    #[test]
    fn test_having_presence_and_value() {
        let list = json!([{"tag": "rust"}, {"tag": "go"}, {"other": 1}, {"tag": 1}]);
        let present = having(&list, &args(&[("attribute", json!("tag"))])).unwrap();
        assert_eq!(present.as_array().unwrap().len(), 3);

        let rust = having(
            &list,
            &args(&[("attribute", json!("tag")), ("value", json!("rust"))]),
        )
        .unwrap();
        assert_eq!(rust, json!([{"tag": "rust"}]));

        let loose = having(&list, &args(&[("attribute", json!("tag")), ("value", json!("1"))])).unwrap();
        assert_eq!(loose, json!([{"tag": 1}]));
    }

    #[test]
    fn test_alt() {
        assert_eq!(alt(&json!(4), &Args::new()).unwrap(), json!(true));
        assert_eq!(alt(&json!(3), &Args::new()).unwrap(), json!(false));
        assert!(alt(&json!("x"), &Args::new()).is_err());
    }

    #[test]
    fn test_page_slice() {
        let list = json!([1, 2, 3, 4, 5]);
        let page = |p: u64| {
            page_slice(&list, &args(&[("page", json!(p)), ("page_size", json!(2))])).unwrap()
        };
        assert_eq!(page(1), json!([1, 2]));
        assert_eq!(page(3), json!([5]));
        assert_eq!(page(4), json!([]));
    }

    #[test]
    fn test_truncate() {
        let long = json!("hello world");
        assert_eq!(truncate(&long, &args(&[("length", json!(5))])).unwrap(), json!("hello..."));
        assert_eq!(
            truncate(&long, &args(&[("length", json!(5)), ("ellipsis", json!("~"))])).unwrap(),
            json!("hello~")
        );
        assert_eq!(truncate(&long, &args(&[("length", json!(50))])).unwrap(), long);
    }

    #[test]
    fn test_filters_in_templates() {
        let mut tera = Tera::default();
        register(&mut tera);
        let mut context = Context::new();
        context.insert("posts", &json!([{"title": "B", "n": 2}, {"title": "A", "n": 1}]));

        let out = tera
            .render_str(
                "{% for p in posts | sort_by(attribute=\"n\") | head(count=1) %}{{ p.title }}{% endfor %}|{{ posts | json_stringify }}",
                &context,
            )
            .unwrap();
        assert_eq!(out, "A|[{\"title\":\"B\",\"n\":2},{\"title\":\"A\",\"n\":1}]");
    }
}
