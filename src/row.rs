use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use sha1::{Digest, Sha1};

/// One `metadata.csv` record. Columns are matched by header name; absent
/// columns read as empty strings.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Row {
    pub cord_uid: String,
    pub sha: String,
    #[serde(rename = "source_x")]
    pub source: String,
    pub title: String,
    pub doi: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub publish_time: String,
    pub authors: String,
    pub journal: String,
    pub pdf_json_files: String,
    pub pmc_json_files: String,
    pub url: String,
}

impl Row {
    /// Identity hash: the first pre-supplied hash, else the SHA-1 of the title.
    pub fn identity_hash(&self) -> String {
        match split_list(&self.sha).next() {
            Some(sha) => sha.to_string(),
            None => content_hash(&self.title),
        }
    }

    pub fn published(&self) -> Option<NaiveDate> {
        resolve_date(&self.publish_time)
    }

    /// First non-API url, falling back to the DOI resolver link.
    pub fn reference_url(&self) -> Option<String> {
        split_list(&self.url)
            .find(|url| !url.contains("https://api."))
            .map(str::to_string)
            .or_else(|| {
                let doi = self.doi.trim();
                (!doi.is_empty()).then(|| format!("https://doi.org/{}", doi))
            })
    }

    /// Companion full-text paths, relative to the input directory.
    pub fn full_text_paths(&self) -> Vec<&str> {
        [&self.pdf_json_files, &self.pmc_json_files]
            .into_iter()
            .flat_map(|column| split_list(column))
            .collect()
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|item| !item.is_empty())
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y %b %d", "%Y %B %d", "%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y",
    "%b %d, %Y", "%B %d, %Y", "%m/%d/%Y", "%Y.%m.%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

// Month-precision forms, completed with day 1 before parsing
const MONTH_FORMATS: &[(&str, &str)] = &[("%Y-%m-%d", "-01"), ("%Y %b %d", " 1"), ("%Y %B %d", " 1"), ("%b %Y %d", " 1"), ("%B %Y %d", " 1")];

/// Parses a free-form publish date. A bare year means January 1 and a
/// bare `YYYYMMDD` is read as a compact date. A parse only counts when its
/// year appears in the input written out in four digits; anything else
/// resolves to `None`.
pub fn resolve_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.chars().all(|c| c.is_ascii_digit()) {
        return compact_date(value).filter(|date| date.year() > 0);
    }

    let written_year = |date: &NaiveDate| date.year() > 0 && value.contains(&format!("{:04}", date.year()));

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
        .into_iter()
        .chain(DATETIME_FORMATS.iter().filter_map(|format| NaiveDateTime::parse_from_str(value, format).ok().map(|dt| dt.date())))
        .chain(DATE_FORMATS.iter().filter_map(|format| NaiveDate::parse_from_str(value, format).ok()))
        .chain(
            MONTH_FORMATS
                .iter()
                .filter_map(|(format, day)| NaiveDate::parse_from_str(&format!("{}{}", value, day), format).ok()),
        )
        .find(written_year)
}

fn compact_date(digits: &str) -> Option<NaiveDate> {
    match digits.len() {
        4 => NaiveDate::from_ymd_opt(digits.parse().ok()?, 1, 1),
        8 => NaiveDate::from_ymd_opt(digits[..4].parse().ok()?, digits[4..6].parse().ok()?, digits[6..].parse().ok()?),
        _ => None,
    }
}
