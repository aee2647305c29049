use regex::Regex;
use std::sync::LazyLock;

/// Runs of ASCII alphanumerics plus the Swedish letters (and the é/ü seen in
/// loanword titles). Anything else separates tokens.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[0-9A-Za-zÅÄÖåäöÉéÜü]+").expect("token pattern is valid")
});

/// Tokenize text into lowercase lexical tokens.
///
/// Used for both corpus documents and queries; any change here changes what
/// the lexical index can match.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}
