//! POSIX-like path algebra for the store namespace.
//!
//! Every function here is pure string manipulation: nothing touches the
//! store, and nothing fails. Malformed input degrades to the most
//! conservative normalized form instead of returning an error. The
//! namespace has a single root, `/`, and resolution assumes the root is
//! the working directory.

use crate::error::{CoreError, CoreResult};

/// The root of the store namespace.
pub const ROOT_DIR: &str = "/";

/// Normalizes a path by collapsing `.` segments, resolving `..`, and
/// squeezing repeated slashes.
///
/// `..` never climbs above the root of an absolute path; such segments are
/// dropped. Relative paths keep their leading `..` segments. A trailing
/// slash on the input is preserved. Empty input normalizes to `.`.
///
/// # Examples
///
/// ```
/// use opfsx_core::fs::path::normalize;
///
/// assert_eq!(normalize("/a/./b/../c"), "/a/c");
/// assert_eq!(normalize("/../.."), "/");
/// assert_eq!(normalize("a/../../b/"), "../b/");
/// ```
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = is_absolute(path);
    let trailing_slash = path.ends_with('/') && path != ROOT_DIR;

    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment != ".." {
            stack.push(segment);
            continue;
        }
        let can_pop = matches!(stack.last(), Some(last) if *last != "..");
        if can_pop {
            stack.pop();
        } else if !absolute {
            stack.push(segment);
        }
    }

    if stack.is_empty() {
        let empty = match (absolute, trailing_slash) {
            (true, _) => ROOT_DIR,
            (false, true) => "./",
            (false, false) => ".",
        };
        return empty.to_string();
    }

    let mut result = String::with_capacity(path.len());
    if absolute {
        result.push('/');
    }
    result.push_str(&stack.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}

/// Joins path segments with single slashes at the boundaries.
///
/// The first non-empty segment decides whether the result is absolute.
/// Empty segments are skipped; an empty list yields `.`. The result is
/// **not** normalized: `..` segments survive until [`normalize`] or
/// [`resolve`] sees them.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return ".".to_string();
    }

    let last = parts.len() - 1;
    let mut result = String::new();
    for (index, part) in parts.iter().enumerate() {
        let mut part: &str = part;
        if index > 0 {
            part = part.trim_start_matches('/');
            if part.is_empty() {
                continue;
            }
            result.push('/');
        }
        if index < last {
            part = part.trim_end_matches('/');
        }
        result.push_str(part);
    }

    if result.is_empty() {
        ".".to_string()
    } else {
        result
    }
}

/// Resolves segments left to right, starting from the root.
///
/// An absolute segment resets the accumulator; a relative one is joined
/// onto it. The final result is normalized, so it is always absolute.
///
/// ```
/// use opfsx_core::fs::path::resolve;
///
/// assert_eq!(resolve(&["/a/b", "../c"]), "/a/c");
/// assert_eq!(resolve(&["/", ".."]), "/");
/// ```
pub fn resolve<S: AsRef<str>>(segments: &[S]) -> String {
    let mut current = ROOT_DIR.to_string();
    for segment in segments {
        let segment = segment.as_ref();
        if is_absolute(segment) {
            current = segment.to_string();
        } else {
            current = join(&[current.as_str(), segment]);
        }
    }
    normalize(&current)
}

/// Returns the directory portion of a path.
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    let trimmed = strip_trailing_slash(&normalized);
    match trimmed.rfind('/') {
        None => ".".to_string(),
        Some(0) => ROOT_DIR.to_string(),
        Some(index) => trimmed[..index].to_string(),
    }
}

/// Returns the last component of a path, optionally removing `ext`.
pub fn basename(path: &str, ext: Option<&str>) -> String {
    let normalized = normalize(path);
    let trimmed = strip_trailing_slash(&normalized);
    let last = trimmed.rsplit('/').next().unwrap_or_default();
    match ext {
        Some(ext) if !ext.is_empty() => last.strip_suffix(ext).unwrap_or(last).to_string(),
        _ => last.to_string(),
    }
}

/// Returns the extension of the last component, including the dot.
///
/// The dot must come after the first character, so dotfiles such as
/// `.gitignore` have no extension.
pub fn extname(path: &str) -> String {
    let base = basename(path, None);
    match base.rfind('.') {
        Some(index) if index > 0 => base[index..].to_string(),
        _ => String::new(),
    }
}

/// Returns `true` if the path starts at the root.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Returns `true` if the path does not start at the root.
pub fn is_relative(path: &str) -> bool {
    !is_absolute(path)
}

/// Normalizes `path` and rejects it unless the result is root-prefixed.
///
/// The trailing slash [`normalize`] preserves is dropped, so the result is
/// the canonical store key. Every mutating operation funnels its paths
/// through here before the first store call.
///
/// # Errors
///
/// - [`CoreError::InvalidPath`] if the normalized path is relative.
pub fn validate_absolute(path: &str) -> CoreResult<String> {
    let normalized = normalize(path);
    if is_relative(&normalized) {
        return Err(CoreError::InvalidPath(path.to_string()));
    }
    Ok(strip_trailing_slash(&normalized).to_string())
}

/// Returns `true` if `name` can be used as a single path component.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

/// Splits an absolute path into its non-empty components.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn strip_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("a/b/../../c"), "c");
        assert_eq!(normalize("//a///b"), "/a/b");
    }

    #[test]
    fn normalize_drops_dotdot_above_root() {
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("/../../a"), "/a");
    }

    #[test]
    fn normalize_keeps_leading_dotdot_on_relative() {
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(normalize("a/../.."), "..");
        assert_eq!(normalize("../../x/.."), "../..");
    }

    #[test]
    fn normalize_preserves_trailing_slash() {
        assert_eq!(normalize("/a/b/"), "/a/b/");
        assert_eq!(normalize("a/./"), "a/");
        assert_eq!(normalize("./"), "./");
    }

    #[test]
    fn normalize_empty_inputs() {
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//"), "/");
        assert_eq!(normalize("."), ".");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "", "/", ".", "./", "..", "../", "//", "/a/b/", "a/../..", "/../x/./y/",
            "a//b///c", "/a/b/../../..", "x/y/../../../z/", "...", "/a/.../b", ".hidden/..",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn join_strips_boundary_slashes() {
        assert_eq!(join(&["/a/", "/b", "c"]), "/a/b/c");
        assert_eq!(join(&["a", "b/"]), "a/b/");
        assert_eq!(join(&["/", "x"]), "/x");
    }

    #[test]
    fn join_does_not_normalize() {
        assert_eq!(join(&["a", "..", "b"]), "a/../b");
    }

    #[test]
    fn join_skips_empty_segments() {
        assert_eq!(join::<&str>(&[]), ".");
        assert_eq!(join(&["", ""]), ".");
        assert_eq!(join(&["", "a", "", "b"]), "a/b");
        assert_eq!(join(&["a", "/", "b"]), "a/b");
    }

    #[test]
    fn resolve_relative_against_absolute() {
        assert_eq!(resolve(&["/a/b", "../c"]), "/a/c");
        assert_eq!(resolve(&["/a", "b", "c"]), "/a/b/c");
    }

    #[test]
    fn resolve_cannot_ascend_above_root() {
        assert_eq!(resolve(&["/", ".."]), "/");
        assert_eq!(resolve(&["/a", "../../.."]), "/");
    }

    #[test]
    fn resolve_absolute_segment_resets() {
        assert_eq!(resolve(&["/a/b", "/x", "y"]), "/x/y");
    }

    #[test]
    fn resolve_starts_from_root() {
        assert_eq!(resolve(&["docs"]), "/docs");
        assert_eq!(resolve::<&str>(&[]), "/");
    }

    #[test]
    fn dirname_cases() {
        assert_eq!(dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(dirname("/a"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(dirname("file.txt"), ".");
        assert_eq!(dirname("/a/b/"), "/a");
        assert_eq!(dirname("/data/.opaque/xyz"), "/data/.opaque");
    }

    #[test]
    fn basename_cases() {
        assert_eq!(basename("/a/b/c.txt", None), "c.txt");
        assert_eq!(basename("/a/b/c.txt", Some(".txt")), "c");
        assert_eq!(basename("/a/b/c.txt", Some(".md")), "c.txt");
        assert_eq!(basename("/a/b/", None), "b");
        assert_eq!(basename("/", None), "");
    }

    #[test]
    fn extname_cases() {
        assert_eq!(extname("archive.tar.gz"), ".gz");
        assert_eq!(extname(".gitignore"), "");
        assert_eq!(extname("noext"), "");
        assert_eq!(extname("/dir.d/file"), "");
        assert_eq!(extname("trailing."), ".");
    }

    #[test]
    fn absolute_and_relative() {
        assert!(is_absolute("/x"));
        assert!(!is_absolute("x"));
        assert!(is_relative("./x"));
        assert!(is_relative(""));
    }

    #[test]
    fn validate_absolute_rejects_relative() {
        assert!(matches!(
            validate_absolute("a/b"),
            Err(CoreError::InvalidPath(_))
        ));
        assert_eq!(validate_absolute("/a/../b").unwrap(), "/b");
        assert_eq!(validate_absolute("/a/b/").unwrap(), "/a/b");
        assert_eq!(validate_absolute("/").unwrap(), "/");
    }

    #[test]
    fn valid_names() {
        assert!(is_valid_name("notes.txt"));
        assert!(is_valid_name(".env"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("."));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\0b"));
    }

    #[test]
    fn components_skip_empty() {
        assert_eq!(components("/a//b/"), vec!["a", "b"]);
        assert!(components("/").is_empty());
    }
}
