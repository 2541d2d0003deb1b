//! Path Resolution
//!
//! Lexical path handling for overlay lookups. Paths are never touched on disk
//! here; they are normalized and split into the segments the tree is keyed by.

/// Lexically normalize a `/`-separated path.
///
/// Collapses repeated separators and `.` segments and resolves `..` against
/// the preceding segment. `..` above the root of an absolute path is dropped;
/// leading `..` of a relative path is kept. A trailing separator survives,
/// and an empty result becomes `.`.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let trailing = path.len() > 1 && path.ends_with('/');

    let mut resolved: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if resolved.last().is_some_and(|last| *last != "..") {
                    resolved.pop();
                } else if !absolute {
                    resolved.push("..");
                }
            }
            _ => resolved.push(part),
        }
    }

    let mut out = resolved.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        return ".".to_string();
    }
    if trailing && out != "/" {
        out.push('/');
    }
    out
}

/// Join `path` onto `base` and normalize the result.
pub fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        return normalize(path);
    }
    normalize(&format!("{}/{}", base, path))
}

/// Break a path into the ordered, non-empty segments used to walk the tree.
///
/// A path whose first character is `.` is resolved against `base_dir`; any
/// other path is only normalized, so a bare relative path such as `a/b` is
/// looked up from the tree root.
pub fn split_path(path: &str, base_dir: &str) -> Vec<String> {
    let normalized = if path.starts_with('.') {
        join(base_dir, path)
    } else {
        normalize(path)
    };
    normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
