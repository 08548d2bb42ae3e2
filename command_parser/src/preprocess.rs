use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Markers some recognizers insert in place of speech
const ARTIFACTS: &[&str] = &["[BLANK_AUDIO]", "[MUSIC]", "[NOISE]", "[SILENCE]", "(inaudible)"];

/// Politeness words that carry no intent
const FILLERS: &[&str] = &[
    "please",
    "can you",
    "could you",
    "would you",
    "will you",
    "i want you to",
    "i'd like you to",
];

static ARTIFACT_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(ARTIFACTS)
        .expect("artifact patterns are valid")
});

static FILLER_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .ascii_case_insensitive(true)
        .build(FILLERS)
        .expect("filler patterns are valid")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Clean recognizer output into the canonical form the pattern table matches
/// against: artifacts removed, lowercase, single spaces, no trailing
/// punctuation, polite fillers dropped.
pub fn preprocess_text(text: &str) -> String {
    let without_artifacts = ARTIFACT_MATCHER.replace_all(text, &[""; ARTIFACTS.len()]);
    let lowered = without_artifacts.to_lowercase();
    let collapsed = WHITESPACE.replace_all(lowered.trim(), " ");
    let trimmed = collapsed.trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';'));

    let without_fillers = remove_fillers(trimmed);
    let collapsed = WHITESPACE.replace_all(without_fillers.trim(), " ");
    collapsed
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Drop filler phrases that stand as whole words
fn remove_fillers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for mat in FILLER_MATCHER.find_iter(text) {
        let before_ok = text[..mat.start()]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[mat.end()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if before_ok && after_ok {
            out.push_str(&text[last..mat.start()]);
            last = mat.end();
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Return the text following the wake word, or `None` when the wake word is
/// absent. Matching is case-insensitive and on whole words.
pub fn strip_wake_word(text: &str, wake_word: &str) -> Option<String> {
    let wake = preprocess_text(wake_word);
    if wake.is_empty() {
        return Some(text.trim().to_string());
    }

    let pattern = format!(r"(?i)\b{}\b[\s,.!?]*", regex::escape(&wake));
    let re = Regex::new(&pattern).ok()?;
    let mat = re.find(text)?;
    Some(text[mat.end()..].trim().to_string())
}
