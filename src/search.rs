use deunicode::deunicode;

/// Normalize a string for picker matching.
/// Folds to ASCII and lowercases (e.g., "Réunion" -> "reunion").
pub fn normalize(s: &str) -> String {
    let folded = deunicode(s);
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim().trim_start_matches('+');
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Whether a country matches an already-normalized query: name substring,
/// exact ISO code, or dial code prefix.
pub fn country_matches(needle: &str, name: &str, code: &str, dial_code: &str) -> bool {
    normalize(name).contains(needle)
        || code.eq_ignore_ascii_case(needle)
        || dial_code.trim_start_matches('+').starts_with(needle)
}

/// Keep only ASCII digits.
pub fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}
