//! Dataset export
//!
//! Serializes the normalized dataset into the two downloadable formats: the
//! full table as CSV and the link-only list.

use crate::error::ConvertError;
use crate::types::{ExportFile, NormalizedDataset, NormalizedRow};
use serde_json::Value;

/// Suggested filename for the full table export
pub const TABLE_FILENAME: &str = "video_browsing_history.csv";

/// Suggested filename for the link-only export
pub const LINKS_FILENAME: &str = "video_browsing_history_links.txt";

/// Writer for the table and link exports
pub struct DatasetExporter;

impl DatasetExporter {
    /// Full table as CSV
    ///
    /// Header is the union of source fields followed by `Date`, `Source` and
    /// `TimeDiff`. An empty dataset yields the header line only.
    pub fn export_table(dataset: &NormalizedDataset) -> Vec<u8> {
        let header = dataset.header();
        let mut csv = String::new();
        push_line(&mut csv, header.iter().map(String::as_str));

        for row in &dataset.rows {
            let cells = table_cells(&dataset.columns, row);
            push_line(&mut csv, cells.iter().map(String::as_str));
        }

        csv.into_bytes()
    }

    /// Comma-separated values of `link_field`, in row order
    ///
    /// Rows lacking the field, or holding null, are skipped. Fails with
    /// `MissingField` when no row of a non-empty dataset carries a value; an
    /// empty dataset yields an empty stream.
    pub fn export_links(
        dataset: &NormalizedDataset,
        link_field: &str,
    ) -> Result<Vec<u8>, ConvertError> {
        if dataset.is_empty() {
            return Ok(Vec::new());
        }

        let links: Vec<String> = dataset
            .rows
            .iter()
            .filter_map(|row| row.field(link_field))
            .filter(|value| !value.is_null())
            .map(|value| escape_csv(&cell_text(value)))
            .collect();

        if links.is_empty() {
            return Err(ConvertError::MissingField(format!(
                "'{}' is not present in any exported record",
                link_field
            )));
        }

        let mut out = links.join(",");
        out.push('\n');
        Ok(out.into_bytes())
    }

    /// Table export with its suggested filename
    pub fn table_file(dataset: &NormalizedDataset) -> ExportFile {
        ExportFile {
            filename: TABLE_FILENAME.to_string(),
            content_type: "text/csv",
            bytes: Self::export_table(dataset),
        }
    }

    /// Link export with its suggested filename
    pub fn links_file(
        dataset: &NormalizedDataset,
        link_field: &str,
    ) -> Result<ExportFile, ConvertError> {
        Ok(ExportFile {
            filename: LINKS_FILENAME.to_string(),
            content_type: "text/plain",
            bytes: Self::export_links(dataset, link_field)?,
        })
    }
}

/// Cell values for one row, aligned with `NormalizedDataset::header`
pub fn table_cells(columns: &[String], row: &NormalizedRow) -> Vec<String> {
    let mut cells: Vec<String> = columns
        .iter()
        .map(|name| row.field(name).map(cell_text).unwrap_or_default())
        .collect();

    cells.push(row.date.to_string());
    cells.push(row.source_category.as_str().to_string());
    cells.push(
        row.time_diff_sec
            .map(|diff| cell_text(&Value::from(diff)))
            .unwrap_or_default(),
    );
    cells
}

/// Text form of a source value; strings unquoted, null empty, nested values as JSON
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line = cells.map(escape_csv).collect::<Vec<_>>().join(",");
    if line.is_empty() {
        return;
    }
    out.push_str(&line);
    out.push('\n');
}

fn escape_csv(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let needs_quotes = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quotes {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::DatasetNormalizer;
    use crate::types::{ActivityRecord, Category};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    fn record(fields: Value, category: Category) -> ActivityRecord {
        let map: Map<String, Value> = fields.as_object().cloned().unwrap_or_default();
        ActivityRecord::new(map, category)
    }

    fn sample_dataset() -> NormalizedDataset {
        DatasetNormalizer::default().normalize(
            vec![
                record(
                    json!({ "Date": "2024-01-15 10:00:00", "Link": "https://www.tiktokv.com/share/video/1/" }),
                    Category::Browsing,
                ),
                record(
                    json!({ "Date": "2024-01-15 10:00:50", "Link": "https://www.tiktokv.com/share/video/2/" }),
                    Category::Browsing,
                ),
                record(
                    json!({ "Date": "2024-01-16 08:00:00", "Link": "https://www.tiktokv.com/share/video/3/", "Sound": "song, \"remix\"" }),
                    Category::Liked,
                ),
            ],
            &Category::ALL,
        )
    }

    /// Minimal CSV reader for quoted fields
    fn parse_csv(text: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, in_quotes) {
                ('"', true) if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                ('"', true) => in_quotes = false,
                ('"', false) => in_quotes = true,
                (',', false) => row.push(std::mem::take(&mut field)),
                ('\n', false) => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                (c, _) => field.push(c),
            }
        }
        rows
    }

    #[test]
    fn test_export_table_layout() {
        let csv = String::from_utf8(DatasetExporter::export_table(&sample_dataset())).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Link,Sound,Date,Source,TimeDiff");
        assert_eq!(
            lines[1],
            "https://www.tiktokv.com/share/video/1/,,2024-01-15 10:00:00,Browsing,"
        );
        assert_eq!(
            lines[2],
            "https://www.tiktokv.com/share/video/2/,,2024-01-15 10:00:50,Browsing,50.0"
        );
        assert_eq!(
            lines[3],
            "https://www.tiktokv.com/share/video/3/,\"song, \"\"remix\"\"\",2024-01-16 08:00:00,Liked,79150.0"
        );
    }

    #[test]
    fn test_export_table_round_trip() {
        let dataset = sample_dataset();
        let csv = String::from_utf8(DatasetExporter::export_table(&dataset)).unwrap();
        let parsed = parse_csv(&csv);

        assert_eq!(parsed.len(), dataset.len() + 1);
        assert_eq!(parsed[0], dataset.header());
        for (row, cells) in dataset.rows.iter().zip(&parsed[1..]) {
            assert_eq!(cells, &table_cells(&dataset.columns, row));
            assert_eq!(
                cells[0],
                row.field("Link").and_then(Value::as_str).unwrap()
            );
        }
        assert_eq!(parsed[3][1], "song, \"remix\"");
    }

    #[test]
    fn test_empty_dataset_table_is_header_only() {
        let csv = DatasetExporter::export_table(&NormalizedDataset::default());
        assert_eq!(String::from_utf8(csv).unwrap(), "Date,Source,TimeDiff\n");
    }

    #[test]
    fn test_export_links_in_row_order() {
        let links = DatasetExporter::export_links(&sample_dataset(), "Link").unwrap();
        assert_eq!(
            String::from_utf8(links).unwrap(),
            "https://www.tiktokv.com/share/video/1/,https://www.tiktokv.com/share/video/2/,https://www.tiktokv.com/share/video/3/\n"
        );
    }

    #[test]
    fn test_export_links_missing_field() {
        let result = DatasetExporter::export_links(&sample_dataset(), "VideoLink");
        assert!(matches!(result, Err(ConvertError::MissingField(_))));
    }

    #[test]
    fn test_export_links_null_is_skipped_and_empty_value_kept() {
        let dataset = DatasetNormalizer::default().normalize(
            vec![
                record(json!({ "Date": "2024-01-15 10:00:00", "Link": null }), Category::Browsing),
                record(json!({ "Date": "2024-01-15 10:01:00", "Link": "a" }), Category::Browsing),
                record(json!({ "Date": "2024-01-15 10:02:00" }), Category::Liked),
            ],
            &Category::ALL,
        );
        let links = DatasetExporter::export_links(&dataset, "Link").unwrap();
        assert_eq!(String::from_utf8(links).unwrap(), "a\n");

        let blank = DatasetNormalizer::default().normalize(
            vec![record(json!({ "Date": "2024-01-15 10:00:00", "Link": "" }), Category::Browsing)],
            &Category::ALL,
        );
        let links = DatasetExporter::export_links(&blank, "Link").unwrap();
        assert_eq!(String::from_utf8(links).unwrap(), "\n");

        let all_null = DatasetNormalizer::default().normalize(
            vec![record(json!({ "Date": "2024-01-15 10:00:00", "Link": null }), Category::Browsing)],
            &Category::ALL,
        );
        assert!(matches!(
            DatasetExporter::export_links(&all_null, "Link"),
            Err(ConvertError::MissingField(_))
        ));
    }

    #[test]
    fn test_export_links_empty_dataset() {
        let links = DatasetExporter::export_links(&NormalizedDataset::default(), "Link").unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_export_files_carry_suggested_names() {
        let dataset = sample_dataset();
        assert_eq!(
            DatasetExporter::table_file(&dataset).filename,
            "video_browsing_history.csv"
        );
        let links = DatasetExporter::links_file(&dataset, "Link").unwrap();
        assert_eq!(links.filename, "video_browsing_history_links.txt");
        assert_eq!(links.content_type, "text/plain");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("plain")), "plain");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&json!({ "a": 1 })), "{\"a\":1}");
    }
}
