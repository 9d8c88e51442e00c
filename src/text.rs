//! Text normalization and sentence splitting for extracted paper text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CITATION_MARKER: Regex = Regex::new(r"\s?\[\d+(?:\s*[,\-–]\s*\d+)*\]").expect("valid citation marker pattern");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid whitespace pattern");
}

/// Words that end with a period without ending the sentence. Compared
/// lowercase and without the trailing period.
const ABBREVIATIONS: &[&str] = &[
    "al", "approx", "ca", "cf", "dept", "dr", "eq", "eqs", "est", "etc", "fig", "figs", "inc", "jr",
    "max", "min", "mr", "mrs", "ms", "no", "nos", "prof", "ref", "refs", "resp", "sp", "spp", "sr",
    "st", "suppl", "tab", "vol", "vs",
];

/// Cleans a raw string: numeric bracket citation markers are dropped,
/// whitespace (newlines included) collapses to single spaces and the result
/// is trimmed.
pub fn normalize(text: &str) -> String {
    let text = CITATION_MARKER.replace_all(text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Splits normalized text into sentences, in order.
pub fn sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }

        let mut end = index + c.len_utf8();
        while let Some(&(next_index, next)) = chars.peek() {
            if is_terminal_trailer(next) {
                end = next_index + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let rest = &text[end..];
        let following = rest.trim_start();
        if following.len() == rest.len() || following.is_empty() {
            continue;
        }
        if !following.chars().next().map_or(false, opens_sentence) {
            continue;
        }
        if c == '.' && ends_with_abbreviation(&text[start..index]) {
            continue;
        }

        push_sentence(&mut sentences, &text[start..end]);
        start = end;
    }

    push_sentence(&mut sentences, &text[start..]);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let sentence = candidate.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
}

fn is_terminal_trailer(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '”' | '’')
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '(' | '[' | '"' | '“' | '\'')
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    let word = prefix
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| matches!(c, '(' | '[' | '"' | '“'));

    if word.is_empty() {
        return false;
    }
    // Initials ("J.") and letter-dot forms ("e.g.", "U.S."); numbers and
    // hostnames still end a sentence
    if word.split('.').all(|part| part.chars().count() == 1 && part.chars().all(char::is_alphabetic)) {
        return true;
    }
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_citation_markers_and_whitespace() {
        let text = "Cases rose [1, 2]  sharply.\nThen fell [3-5].";
        assert_eq!(normalize(text), "Cases rose sharply. Then fell.");
    }

    #[test]
    fn normalize_keeps_non_numeric_brackets() {
        assert_eq!(normalize("  a [see above]\tb  "), "a [see above] b");
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let split = sentences("The virus spreads. Masks help! Does it work? Yes.");
        assert_eq!(split, vec!["The virus spreads.", "Masks help!", "Does it work?", "Yes."]);
    }

    #[test]
    fn abbreviations_do_not_split() {
        let split = sentences("See Fig. 2 for details, e.g. Table 1. Smith et al. Reported it. Done.");
        assert_eq!(split, vec!["See Fig. 2 for details, e.g. Table 1.", "Smith et al. Reported it.", "Done."]);
    }

    #[test]
    fn decimals_and_initials_do_not_split() {
        let split = sentences("J. Smith gave 3.5 mg daily. Another followed.");
        assert_eq!(split, vec!["J. Smith gave 3.5 mg daily.", "Another followed."]);
    }

    #[test]
    fn numbers_and_hostnames_end_sentences() {
        assert_eq!(sentences("The rate was 3.5. Then it fell."), vec!["The rate was 3.5.", "Then it fell."]);
        assert_eq!(sentences("Visit www.who.int. Then leave."), vec!["Visit www.who.int.", "Then leave."]);
        assert_eq!(sentences("Data from the U.S. Army were used."), vec!["Data from the U.S. Army were used."]);
    }

    #[test]
    fn lowercase_continuation_does_not_split() {
        assert_eq!(sentences("It was approx. five days. ok then"), vec!["It was approx. five days. ok then"]);
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let split = sentences("He said \"stop.\" Then left.");
        assert_eq!(split, vec!["He said \"stop.\"", "Then left."]);
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(sentences("").is_empty());
        assert!(sentences("   ").is_empty());
    }
}
