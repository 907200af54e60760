//! Text normalization for indexed rows.
//!
//! Two forms are produced for every title and summary:
//!
//! - the **updated** form ([`canonicalize_punctuation`]) is what users see:
//!   typographic hyphens and non-breaking spaces are folded to their ASCII
//!   counterparts, nothing else changes;
//! - the **normalized** form ([`normalize`]) is what queries are matched
//!   against: compatibility-folded (half-width kana, full-width Latin,
//!   presentation ligatures), hiragana folded to katakana, lower-cased,
//!   stripped of diacritics and of everything that is not a letter or digit.
//!
//! All functions are pure and deterministic.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const HIRAGANA_START: char = '\u{3041}';
const HIRAGANA_END: char = '\u{3096}';
/// Distance between a hiragana code point and its katakana counterpart.
const KANA_OFFSET: u32 = 0x60;

/// Kana voicing marks survive diacritic stripping; they are recomposed by NFC.
const COMBINING_VOICED_MARK: char = '\u{3099}';
const COMBINING_SEMI_VOICED_MARK: char = '\u{309A}';

/// Folds typographic hyphens and non-breaking spaces to ASCII.
///
/// `"Wi\u{2011}Fi"` becomes `"Wi-Fi"`. The result stays human-readable.
pub fn canonicalize_punctuation(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' | '\u{FE63}'
            | '\u{FF0D}' => '-',
            '\u{00A0}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect()
}

/// Produces the matching form of `input`.
///
/// Stable under repetition: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let folded: String = canonicalize_punctuation(input)
        .nfkc()
        .map(hiragana_to_katakana)
        .collect::<String>()
        .to_lowercase();

    let stripped: String = folded
        .nfd()
        .filter(|c| {
            !is_combining_mark(*c) || *c == COMBINING_VOICED_MARK || *c == COMBINING_SEMI_VOICED_MARK
        })
        .nfc()
        .collect();

    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match fold_ligature(c) {
            Some(expanded) => out.push_str(expanded),
            None if c.is_alphanumeric() => out.push(c),
            None => {}
        }
    }
    out
}

/// Maps a single hiragana character to katakana; other characters pass through.
///
/// The iteration marks `ゝ`/`ゞ` map to `ヽ`/`ヾ`.
pub fn hiragana_to_katakana(c: char) -> char {
    let shifted = match c {
        HIRAGANA_START..=HIRAGANA_END | '\u{309D}' | '\u{309E}' => {
            char::from_u32(c as u32 + KANA_OFFSET)
        }
        _ => None,
    };
    shifted.unwrap_or(c)
}

/// Converts a comma-separated keyword list into a space-separated one.
///
/// Whitespace following a comma is consumed; other whitespace is kept.
pub fn space_delimit_keywords(input: &str) -> String {
    let mut parts = input.split(',');
    let mut out = String::with_capacity(input.len());
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        out.push(' ');
        out.push_str(part.trim_start());
    }
    out
}

/// Lower-case letters that NFD does not decompose.
fn fold_ligature(c: char) -> Option<&'static str> {
    match c {
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ß' => Some("ss"),
        'ø' => Some("o"),
        'đ' | 'ð' => Some("d"),
        'ł' => Some("l"),
        'ı' => Some("i"),
        'þ' => Some("th"),
        _ => None,
    }
}
