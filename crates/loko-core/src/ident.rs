//! Name and identifier rules, plus the glob matcher used by search

use crate::error::ValidationError;

/// Values longer than this are truncated in error messages.
pub const MAX_ERROR_VALUE_LEN: usize = 50;

/// Truncate a value for display in an error message.
pub fn truncate_value(value: &str) -> String {
    if value.chars().count() > MAX_ERROR_VALUE_LEN {
        let cut: String = value.chars().take(MAX_ERROR_VALUE_LEN).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}

/// Validate a human display name: letters, digits, spaces, `_` and `-`,
/// starting with an alphanumeric character.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("entity", "name", name, "name must not be empty"));
    }
    let first = name.chars().next().unwrap_or(' ');
    if !first.is_ascii_alphanumeric() {
        return Err(ValidationError::new(
            "entity",
            "name",
            name,
            "name must start with a letter or digit",
        ));
    }
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-') {
            return Err(ValidationError::new(
                "entity",
                "name",
                name,
                "name may only contain letters, digits, spaces, '_' and '-'",
            ));
        }
    }
    Ok(())
}

/// Derive the stable ID form of a name: lowercase, spaces and underscores
/// become `-`, runs of `-` collapse, leading/trailing `-` are trimmed.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let mapped = if c == ' ' || c == '_' { '-' } else { c };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Validate an ID: `[a-z0-9][a-z0-9-]*`.
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::new("entity", "id", id, "id must not be empty"));
    }
    let mut chars = id.chars();
    let first = chars.next().unwrap_or(' ');
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(ValidationError::new(
            "entity",
            "id",
            id,
            "id must start with a lowercase letter or digit",
        ));
    }
    for c in chars {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(ValidationError::new(
                "entity",
                "id",
                id,
                "id may only contain lowercase letters, digits and '-'",
            ));
        }
    }
    Ok(())
}

/// Validate a qualified ID path such as `system/container/component`:
/// `/`-separated, every segment a valid ID.
pub fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::new("entity", "path", path, "path must not be empty"));
    }
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(ValidationError::new(
                "entity",
                "path",
                path,
                "path must not contain empty segments",
            ));
        }
        validate_id(segment)
            .map_err(|_| ValidationError::new("entity", "path", path, "path segment is not a valid id"))?;
    }
    Ok(())
}

/// The final segment of a qualified ID.
pub fn short_id(qualified: &str) -> &str {
    qualified.rsplit('/').next().unwrap_or(qualified)
}

/// Glob match supporting `*` (zero or more characters) and `?` (exactly one).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let has_star = pattern.contains('*');
    let has_question = pattern.contains('?');
    match (has_star, has_question) {
        (false, false) => pattern == text,
        (true, true) => match_with_backtrack(pattern, text),
        (false, true) => match_question_only(pattern, text),
        (true, false) => match_star_only(pattern, text),
    }
}

/// True if any of the patterns matches.
pub fn match_any<S: AsRef<str>>(text: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| glob_match(p.as_ref(), text))
}

/// Two-pointer match with backtracking at the most recent `*`.
fn match_with_backtrack(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// `?`-only patterns require equal length and position-wise equality.
fn match_question_only(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    if p.len() != t.len() {
        return false;
    }
    p.iter().zip(t.iter()).all(|(pc, tc)| *pc == '?' || pc == tc)
}

/// `*`-only patterns: prefix of the first segment, suffix of the last,
/// middle segments occurring in order.
fn match_star_only(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }
    let mut pos = first.len();
    let end = text.len() - last.len();
    if pos > end {
        return false;
    }
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match text[pos..end].find(part) {
            Some(i) => pos += i + part.len(),
            None => return false,
        }
    }
    true
}
