//! Path and link conversion utilities.
//!
//! This module handles conversions between:
//! - Relative output paths and a flow's destination directory
//! - Numbered output names for expanded entries (splits, pages)
//! - Destination paths and the path segments a permalink is built from

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::build::pipeline::FlowInfo;

/// Join a relative output path below a flow's destination directory.
///
/// Leading separators on `relative` are ignored so a template producing
/// `/blog/post.html` still lands inside `dest`.
///
/// # Examples
/// ```ignore
/// join_dest(Some("public"), "blog/post.html") => "public/blog/post.html"
/// join_dest(Some("public"), "/about.html") => "public/about.html"
/// join_dest(None, "about.html") => "about.html"
/// ```
pub fn join_dest(dest: Option<&Path>, relative: &str) -> PathBuf {
    let relative = relative.trim_start_matches(['/', MAIN_SEPARATOR]);
    match dest {
        Some(dest) => dest.join(relative),
        None => PathBuf::from(relative),
    }
}

/// Output path for the n-th entry expanded from one source entry.
///
/// Produces `<dest>/<basename><suffix><outExt>`, or `None` when the flow
/// has no destination directory.
///
/// # Examples
/// ```ignore
/// numbered_dest(flow /* dest: "public", outExt: ".html" */, Some("news"), "2")
///     => Some("public/news2.html")
/// ```
pub fn numbered_dest(flow: &FlowInfo, basename: Option<&str>, suffix: &str) -> Option<PathBuf> {
    let dest = flow.dest.as_ref()?;
    let name = format!("{}{}{}", basename.unwrap_or_default(), suffix, flow.out_ext);
    Some(dest.join(name))
}

/// Split a destination path into the segments used for its permalink.
///
/// A final `index.*` segment is dropped so index files link to their
/// directory, then `strip` leading segments (usually the output root) are
/// removed. Entries without a destination yield no segments.
///
/// # Examples
/// ```ignore
/// link_segments(Some("public/blog/post.html"), 1) => ["blog", "post.html"]
/// link_segments(Some("public/blog/index.html"), 1) => ["blog"]
/// link_segments(Some("public/index.html"), 1) => []
/// link_segments(None, 1) => []
/// ```
pub fn link_segments(dest_path: Option<&Path>, strip: usize) -> Vec<String> {
    let Some(dest_path) = dest_path else {
        return Vec::new();
    };

    let text = dest_path.to_string_lossy();
    let segments: Vec<&str> = text.split(['/', MAIN_SEPARATOR]).collect();

    let mut end = segments.len();
    if dest_path.file_stem().and_then(|s| s.to_str()) == Some("index") {
        end -= 1;
    }
    let start = strip.min(end);

    segments[start..end].iter().map(|s| s.to_string()).collect()
}

/// Default permalink policy: the prefix followed by the segments joined
/// with `/`.
pub fn default_permalink(prefix: &str, segments: &[String]) -> String {
    format!("{}{}", prefix, segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_dest() {
        assert_eq!(
            join_dest(Some(Path::new("public")), "blog/post.html"),
            PathBuf::from("public/blog/post.html")
        );
        assert_eq!(
            join_dest(Some(Path::new("public")), "/about.html"),
            PathBuf::from("public/about.html")
        );
        assert_eq!(join_dest(None, "about.html"), PathBuf::from("about.html"));
    }

    #[test]
    fn test_numbered_dest() {
        let flow = FlowInfo::new("news").with_dest("public").with_out_ext(".html");
        assert_eq!(
            numbered_dest(&flow, Some("news"), "2"),
            Some(PathBuf::from("public/news2.html"))
        );
        assert_eq!(numbered_dest(&flow, None, "0"), Some(PathBuf::from("public/0.html")));
        assert_eq!(numbered_dest(&FlowInfo::new("bare"), Some("x"), "1"), None);
    }

    #[test]
    fn test_link_segments_regular_file() {
        assert_eq!(
            link_segments(Some(Path::new("public/blog/post.html")), 1),
            vec!["blog", "post.html"]
        );
    }

    #[test]
    fn test_link_segments_index_collapses() {
        assert_eq!(
            link_segments(Some(Path::new("public/blog/index.html")), 1),
            vec!["blog"]
        );
        assert!(link_segments(Some(Path::new("public/index.html")), 1).is_empty());
    }

    #[test]
    fn test_link_segments_strip_beyond_length() {
        assert!(link_segments(Some(Path::new("public/a.html")), 5).is_empty());
        assert_eq!(
            link_segments(Some(Path::new("public/a.html")), 0),
            vec!["public", "a.html"]
        );
    }

    #[test]
    fn test_link_segments_without_destination() {
        assert!(link_segments(None, 1).is_empty());
    }

    #[test]
    fn test_default_permalink() {
        assert_eq!(default_permalink("/", &[]), "/");
        assert_eq!(
            default_permalink("/", &["blog".to_string(), "post.html".to_string()]),
            "/blog/post.html"
        );
    }
}
