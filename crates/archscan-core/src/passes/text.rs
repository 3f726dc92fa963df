//! Line helpers shared by the extractors.

/// Count newlines before a byte offset to get a 1-based line number.
pub fn line_at(content: &str, offset: usize) -> u32 {
    let offset = offset.min(content.len());
    (content.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1) as u32
}

/// Join `lines[start..start + len]`, clamped to `end`.
pub fn window(lines: &[&str], start: usize, len: usize, end: usize) -> String {
    let stop = (start + len).min(end).min(lines.len());
    if start >= stop {
        return String::new();
    }
    lines[start..stop].join("\n")
}

/// File name component of a slash-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent directory of a slash-separated path, `""` at the root.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Whether `path` lies under directory `dir` (`""` or `"."` is the root).
pub fn is_under(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || dir == "."
        || path
            .strip_prefix(dir)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// First line containing `needle`, 1-based, with the line's text.
pub fn find_line<'a>(content: &'a str, needle: &str) -> Option<(u32, &'a str)> {
    content
        .lines()
        .enumerate()
        .find(|(_, line)| line.contains(needle))
        .map(|(idx, line)| (idx as u32 + 1, line))
}

/// First non-blank line, 1-based.
pub fn first_line(content: &str) -> Option<(u32, &str)> {
    content
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx as u32 + 1, line))
}

/// Strip matching single, double or back quotes from a token.
pub fn unquote(token: &str) -> &str {
    let token = token.trim();
    for quote in ['\'', '"', '`'] {
        if let Some(inner) = token
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return inner;
        }
    }
    token
}
