//! File name handling for committed downloads
//!
//! Display names come straight from remote pages and may contain anything.

/// Characters that are refused in file names on at least one common platform
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Returns true if `c` may not appear in a committed file name
pub fn is_forbidden_char(c: char) -> bool {
    FORBIDDEN.contains(&c) || c.is_control()
}

/// Makes a display name safe to use as a file name
///
/// Forbidden characters become `placeholder`, surrounding whitespace is
/// trimmed, and a result that is empty, `.` or `..` becomes `fallback`.
pub fn sanitize_name(name: &str, placeholder: char, fallback: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_forbidden_char(c) { placeholder } else { c })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Longest file name component most filesystems accept, in bytes
pub const MAX_NAME_BYTES: usize = 255;

/// Longest suffix still treated as an extension when a name is shortened
const MAX_EXTENSION_BYTES: usize = 16;

/// Builds the committed name `{sequence}_{name}`, shortened to [`MAX_NAME_BYTES`]
pub fn final_name(sequence: u64, sanitized: &str) -> String {
    let prefix = format!("{}_", sequence);
    let budget = MAX_NAME_BYTES.saturating_sub(prefix.len());
    format!("{}{}", prefix, truncate_name(sanitized, budget))
}

/// Cuts `name` down to at most `max_bytes`
///
/// The stem is shortened on a char boundary and a short extension is kept,
/// so `Звіт ... .pdf` stays a `.pdf`.
pub fn truncate_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES.min(max_bytes / 2) => {
            name.split_at(dot)
        }
        _ => (name, ""),
    };

    let mut end = max_bytes.saturating_sub(extension.len()).min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", stem[..end].trim_end(), extension)
}

/// Reads the sequence number back out of a committed file name
pub fn parse_sequence_prefix(file_name: &str) -> Option<u64> {
    let (prefix, rest) = file_name.split_once('_')?;
    if rest.is_empty() || prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// Returns true if `name` contains one of `keywords`, ignoring case
///
/// An empty keyword list matches everything.
pub fn matches_keywords(name: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let name = name.to_lowercase();
    keywords
        .iter()
        .any(|keyword| name.contains(&keyword.to_lowercase()))
}
