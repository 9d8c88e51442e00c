use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::section::Section;

pub const COVID_TAG: &str = "COVID-19";

/// Keyword patterns for the disease and its virus, matched case-insensitively
/// on word boundaries.
const KEYWORDS: &[&str] = &[
    r"2019[\-\s]?n[\-\s]?cov",
    r"2019 novel coronavirus",
    r"coronavirus 2(?:019)?",
    r"coronavirus disease (?:20)?19",
    r"covid(?:[\-\s]?(?:20)?19)?",
    r"n\s?cov[\-\s]?2019",
    r"sars[\-\s]cov-?2",
    r"wuhan (?:coronavirus|cov|pneumonia)",
];

lazy_static! {
    static ref KEYWORD_PATTERN: Regex = {
        let alternatives: Vec<String> = KEYWORDS.iter().map(|keyword| format!(r"\b{}\b", keyword)).collect();
        Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("valid keyword pattern")
    };
}

/// Records published before this date cannot be about the disease.
pub fn cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 7, 1).unwrap_or(NaiveDate::MIN)
}

/// Tags a record when its date is unknown or recent and any section mentions
/// a keyword.
pub fn classify(sections: &[Section], published: Option<NaiveDate>) -> Option<String> {
    if published.map_or(false, |date| date < cutoff()) {
        return None;
    }

    sections
        .iter()
        .any(|section| KEYWORD_PATTERN.is_match(&section.text))
        .then(|| COVID_TAG.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(texts: &[&str]) -> Vec<Section> {
        texts.iter().map(|text| Section::new(None, text.to_string())).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn keyword_variants_match() {
        for text in [
            "Patients with COVID-19 were admitted.",
            "covid19 outcomes",
            "The SARS-CoV-2 genome.",
            "sars cov2 spike",
            "2019-nCoV transmission",
            "Severe acute respiratory syndrome coronavirus 2 infection",
            "coronavirus disease 2019 cases",
            "Wuhan pneumonia cluster",
            "nCoV-2019 samples",
        ] {
            assert_eq!(classify(&sections(&[text]), None).as_deref(), Some(COVID_TAG), "{}", text);
        }
    }

    #[test]
    fn word_boundaries_are_required() {
        assert_eq!(classify(&sections(&["The covidence tool.", "A coronavirus 229E study."]), None), None);
    }

    #[test]
    fn old_records_never_tagged() {
        assert_eq!(classify(&sections(&["COVID-19 review"]), date(2018, 5, 1)), None);
        assert_eq!(classify(&sections(&["COVID-19 review"]), date(2019, 6, 30)), None);
    }

    #[test]
    fn recent_or_unknown_dates_scan_text() {
        assert_eq!(classify(&sections(&["COVID-19 review"]), date(2019, 7, 1)).as_deref(), Some(COVID_TAG));
        assert_eq!(classify(&sections(&["nothing here", "SARS-CoV-2"]), None).as_deref(), Some(COVID_TAG));
        assert_eq!(classify(&sections(&["Influenza season"]), date(2020, 2, 1)), None);
        assert_eq!(classify(&[], None), None);
    }

    #[test]
    fn month_year_publish_date_is_scanned() {
        let published = crate::row::resolve_date("March 2020");
        assert_eq!(published, date(2020, 3, 1));
        assert_eq!(classify(&sections(&["SARS-CoV-2 outcomes in adults."]), published).as_deref(), Some(COVID_TAG));
    }
}
