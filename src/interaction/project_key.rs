use std::sync::LazyLock;

use regex::Regex;

/// Patterns tried in order; the first non-excluded capture wins.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)project\s+([A-Z]{2,10})\b",
        r"(?i)\b([A-Z]{2,10})\s+projects?",
        r"(?i)of\s+([A-Z]{2,10})\b",
        r"(?i)for\s+([A-Z]{2,10})\b",
        r"(?i)\b([A-Z]{2,10})\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("project key patterns are valid"))
    .collect()
});

/// Words that look like keys but never are.
const EXCLUDED_WORDS: &[&str] = &[
    "WHAT", "WHEN", "WHERE", "WHY", "HOW", "WHO", "WHICH", "WHOSE", "THE", "IS", "ARE", "WAS", "WERE", "BE", "BEEN", "BEING", "OF", "TO", "IN", "ON", "AT", "FOR", "WITH", "FROM", "BY", "AND",
    "OR", "BUT", "IF", "THEN", "ELSE", "THIS", "THAT", "STATUS", "PROJECT", "PROJECTS", "SHOW", "TELL", "GIVE", "ME", "MY", "YOU", "YOUR", "OUR", "THEIR", "HIS", "HER", "ABOUT", "ROADMAP",
    "SUMMARY", "DETAILS",
];

/// Pull a Jira project key out of a free-form question.
///
/// Keys are 2 to 10 ASCII letters and come back upper-cased. More specific
/// phrasings (`project ABC`, `ABC project`, `of ABC`, `for ABC`) are tried
/// before falling back to any short word that is not a common English word.
pub fn extract_project_key(query: &str) -> Option<String> {
    PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(query)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
            .find(|candidate| !EXCLUDED_WORDS.contains(&candidate.as_str()))
    })
}
