//! Matching corners against corner patterns.

use std::path::PathBuf;

use arcstr::ArcStr;
use config::Value;
use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};

/// Returns `true` if `corner` matches the wildcard `pattern`.
///
/// `*` matches any run of characters and `?` matches one character;
/// everything else matches literally.
pub fn matches(pattern: &str, corner: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == corner;
    }
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).is_ok_and(|re| re.is_match(corner))
}

/// Turns a corner name or pattern into a directory name.
pub fn sanitize(corner: &str) -> String {
    let trimmed = corner.trim_matches(['*', '_']).replace(['*', '?'], "_");
    if trimmed.is_empty() {
        "all".to_string()
    } else {
        trimmed
    }
}

/// Assigns every corner a distinct directory name.
///
/// Names are [`sanitize`]d. A name already taken by an earlier corner gets
/// the corner's position in `corners` appended, so no two corners share a
/// directory.
pub fn corner_dirs(corners: &[ArcStr]) -> IndexMap<ArcStr, String> {
    let mut dirs: IndexMap<ArcStr, String> = IndexMap::new();
    for (i, corner) in corners.iter().enumerate() {
        if dirs.contains_key(corner) {
            continue;
        }
        let base = sanitize(corner);
        let mut name = base.clone();
        let mut n = i;
        while dirs.values().any(|taken| *taken == name) {
            name = format!("{base}-{n}");
            n += 1;
        }
        dirs.insert(corner.clone(), name);
    }
    dirs
}

/// Collects the paths of a corner-scoped configuration value that apply to `corner`.
///
/// Dictionaries map corner patterns to a path or a list of paths; entries
/// are visited in lexicographic pattern order. A path or list that is not
/// scoped by corner always applies.
pub fn filter_config_paths(value: &Value, corner: &str) -> Vec<PathBuf> {
    match value {
        Value::Dict(entries) => {
            let mut patterns = entries.keys().collect::<Vec<_>>();
            patterns.sort();
            patterns
                .into_iter()
                .filter(|pattern| matches(pattern, corner))
                .flat_map(|pattern| flatten_paths(&entries[pattern]))
                .collect()
        }
        other => flatten_paths(other),
    }
}

fn flatten_paths(value: &Value) -> Vec<PathBuf> {
    match value {
        Value::Path(p) => vec![p.clone()],
        Value::Str(s) => vec![PathBuf::from(s.as_str())],
        Value::List(items) => items.iter().flat_map(flatten_paths).collect(),
        _ => Vec::new(),
    }
}

/// Collects the per-corner artifacts whose corner pattern matches `corner`,
/// in lexicographic pattern order.
pub fn filter_view_paths(views: &IndexMap<ArcStr, PathBuf>, corner: &str) -> Vec<PathBuf> {
    let mut entries = views
        .iter()
        .filter(|(pattern, _)| matches(pattern, corner))
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, path)| path.clone()).collect()
}

/// Picks the artifact to use for `corner` among `candidates`.
///
/// No candidate is an error. Several candidates are a warning, and the
/// first is used.
pub fn pick_one(candidates: Vec<PathBuf>, corner: &str, what: &'static str) -> Result<PathBuf> {
    let count = candidates.len();
    let mut candidates = candidates.into_iter();
    let Some(first) = candidates.next() else {
        return Err(Error::CornerResolution {
            corner: corner.into(),
            what,
        });
    };
    if count > 1 {
        tracing::warn!(
            corner,
            what,
            count,
            picked = %first.display(),
            "multiple candidates are compatible with the corner, using the first"
        );
    }
    Ok(first)
}
