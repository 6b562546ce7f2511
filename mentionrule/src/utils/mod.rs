use lazy_static::lazy_static;
use onig::Regex;

pub mod parallelism;
pub mod regex;

lazy_static! {
    // see https://stackoverflow.com/a/17773849
    pub(crate) static ref URL_REGEX: Regex = Regex::new(r"(https?:\/\/(?:www\.|(?!www))[a-zA-Z0-9][a-zA-Z0-9-]+[a-zA-Z0-9]\.[^\s]{2,}|www\.[a-zA-Z0-9][a-zA-Z0-9-]+[a-zA-Z0-9]\.[^\s]{2,}|https?:\/\/(?:www\.|(?!www))[a-zA-Z0-9]+\.[^\s]{2,}|www\.[a-zA-Z0-9]+\.[^\s]{2,})").expect("URL regex is valid");
    static ref DOMAIN_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*(\.[a-zA-Z0-9-]+)*\.(com|org|net|edu|gov|uk|io|co|info)(\.[a-z]{2})?(\/\S*)?$")
            .expect("domain regex is valid");
}

/// Heuristic for whether a token looks like a URL or a bare domain name.
pub fn like_url(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    URL_REGEX
        .find(text)
        .map_or(false, |(start, end)| start == 0 && end == text.len())
        || DOMAIN_REGEX.find(text).is_some()
}

#[inline]
pub fn splitting_chars() -> &'static str {
    r##"«»'’`´‘],.:;!?/\()<=>„“”"+#…*"##
}

#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Whether `c` may appear in an XML 1.0 document.
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
