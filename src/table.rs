//! Flattens HTML tables from reference entries into one text line per row.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

lazy_static! {
    static ref ROW: Selector = Selector::parse("tr").expect("valid row selector");
    static ref HEADER_CELL: Selector = Selector::parse("th").expect("valid header selector");
    static ref DATA_CELL: Selector = Selector::parse("td").expect("valid cell selector");
    static ref ANY_CELL: Selector = Selector::parse("th, td").expect("valid cell selector");
}

/// Returns the text rows of every table in `html`. Header labels prefix
/// each value when the header and cell counts line up.
pub fn rows(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut headers: Vec<String> = Vec::new();
    let mut texts = Vec::new();

    for row in fragment.select(&ROW) {
        // A header row has only th cells; th used as a row label stays data
        if headers.is_empty() && row.select(&DATA_CELL).next().is_none() {
            let labels: Vec<String> = row.select(&HEADER_CELL).map(cell_text).collect();
            if !labels.is_empty() {
                headers = labels;
                continue;
            }
        }

        let values: Vec<String> = row.select(&ANY_CELL).map(cell_text).collect();
        if values.is_empty() {
            continue;
        }

        let text = if headers.len() == values.len() {
            headers
                .iter()
                .zip(&values)
                .filter(|(_, value)| !value.is_empty())
                .map(|(header, value)| if header.is_empty() { value.clone() } else { format!("{} {}", header, value) })
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            values.iter().filter(|value| !value.is_empty()).cloned().collect::<Vec<_>>().join(" ")
        };

        if !text.is_empty() {
            texts.push(text);
        }
    }

    texts
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_labels_prefix_values() {
        let html = "<table><tr><th>Group</th><th>Cases</th></tr><tr><td>Adults</td><td>120</td></tr><tr><td>Children</td><td></td></tr></table>";
        assert_eq!(rows(html), vec!["Group Adults Cases 120", "Group Children"]);
    }

    #[test]
    fn rows_without_headers_join_values() {
        let html = "<table><tr><td> Fever </td><td>88%</td></tr><tr><td>Cough\n</td><td>68%</td></tr></table>";
        assert_eq!(rows(html), vec!["Fever 88%", "Cough 68%"]);
    }

    #[test]
    fn mismatched_header_count_falls_back_to_values() {
        let html = "<table><tr><th>Only</th></tr><tr><td>a</td><td>b</td></tr></table>";
        assert_eq!(rows(html), vec!["a b"]);
    }

    #[test]
    fn row_label_cells_are_kept_as_data() {
        let html = "<table><tr><th>Fever</th><td>88%</td></tr><tr><th>Cough</th><td>68%</td></tr></table>";
        assert_eq!(rows(html), vec!["Fever 88%", "Cough 68%"]);

        let html = "<table><tr><th>Symptom</th><th>Rate</th></tr><tr><th>Fever</th><td>88%</td></tr></table>";
        assert_eq!(rows(html), vec!["Symptom Fever Rate 88%"]);
    }

    #[test]
    fn empty_rows_are_dropped() {
        let html = "<table><tr><td> </td><td></td></tr></table>";
        assert!(rows(html).is_empty());
        assert!(rows("").is_empty());
    }
}
