//! Helpers for vendor build numbers such as `14G60`, `12F5061` or `17A5508m`
//!
//! A build number is a one- or two-digit branch number, an uppercase branch
//! letter, a numeric run and an optional lowercase suffix letter.

use regex::Regex;
use std::sync::LazyLock;

static BETA_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]?[0-9][A-Z][4-6][0-9]{3}[a-z]?$").expect("valid regex")
});

static WELL_FORMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]?[0-9][A-Z][0-9]{1,5}[a-z]?$").expect("valid regex"));

static EMBEDDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]?[0-9][A-Z][0-9]{1,3}").expect("valid regex"));

/// Check whether a build number looks like a beta build (or an inflated one).
///
/// This is a heuristic: four-digit runs starting with 4, 5 or 6 are how
/// betas are usually numbered, but not every such build is a beta.
pub fn looks_like_beta(build: &str) -> bool {
    BETA_SHAPE.is_match(build)
}

/// Check whether a string is a well-formed build number
pub fn is_well_formed(build: &str) -> bool {
    WELL_FORMED.is_match(build)
}

/// Check whether a string contains something shaped like a build number
pub fn contains_build(s: &str) -> bool {
    EMBEDDED.is_match(s)
}

/// Byte index just past the branch letter, if there is one.
///
/// The first character is never treated as the branch letter.
pub fn branch_end(build: &str) -> Option<usize> {
    build
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, c)| i + c.len_utf8())
}

/// Check whether the second character is a letter (builds before the
/// two-digit branch numbers, e.g. `9A334`)
pub fn is_old_style(build: &str) -> bool {
    build.chars().nth(1).is_some_and(|c| c.is_ascii_alphabetic())
}

/// Remove the padding inserted after the branch letter of a beta-shaped
/// build: the first digit, then one `0` if it follows.
///
/// `12F5061` becomes `12F61`, `15B6092` becomes `15B92`. Builds that are
/// not beta-shaped come back unchanged.
pub fn remove_padding(build: &str) -> String {
    if !looks_like_beta(build) {
        return build.to_string();
    }

    let Some(letter_end) = branch_end(build) else {
        return build.to_string();
    };

    let rest = &build[letter_end..];
    let mut digits = rest.chars();
    digits.next();
    let remainder = digits.as_str();
    let remainder = remainder.strip_prefix('0').unwrap_or(remainder);

    format!("{}{}", &build[..letter_end], remainder)
}

/// Split a build into (prefix through branch letter, numeric run, suffix letter)
pub fn split(build: &str) -> (&str, &str, &str) {
    let Some(letter_end) = branch_end(build) else {
        return (build, "", "");
    };

    let rest = &build[letter_end..];
    let digit_end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(rest.len(), |(i, _)| i);

    (&build[..letter_end], &rest[..digit_end], &rest[digit_end..])
}

/// Pad the numeric run after the branch letter to at least three digits,
/// keeping any suffix letter: `10A55` becomes `10A055`.
pub fn pad_numeric_run(build: &str) -> String {
    let (prefix, digits, suffix) = split(build);
    format!("{prefix}{digits:0>3}{suffix}")
}
