//! Export package record extraction
//!
//! The export format has renamed sections between versions, so each category
//! maps to an ordered list of candidate key-paths under the `Activity` root.
//! The first candidate that yields a non-empty list wins; a category with no
//! matching candidate is simply empty.

use crate::error::ConvertError;
use crate::types::{ActivityRecord, Category};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Top-level key every known export version nests activity under
pub const ACTIVITY_ROOT: &str = "Activity";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A `(section, list-field)` location of a record list under the activity root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPath {
    pub section: String,
    pub list_field: String,
}

impl KeyPath {
    pub fn new(section: impl Into<String>, list_field: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            list_field: list_field.into(),
        }
    }
}

/// Declarative table of candidate key-paths per category
#[derive(Debug, Clone)]
pub struct ExportLayout {
    root: String,
    candidates: Vec<(Category, Vec<KeyPath>)>,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            root: ACTIVITY_ROOT.to_string(),
            candidates: vec![
                (
                    Category::Browsing,
                    vec![KeyPath::new("Video Browsing History", "VideoList")],
                ),
                (
                    Category::Favorite,
                    vec![
                        KeyPath::new("Favorite Videos", "FavoriteVideoList"),
                        KeyPath::new("Favorite", "FavoriteVideoList"),
                    ],
                ),
                (
                    Category::Liked,
                    vec![
                        KeyPath::new("Like List", "ItemFavoriteList"),
                        KeyPath::new("Liked", "ItemFavoriteList"),
                    ],
                ),
            ],
        }
    }
}

impl ExportLayout {
    /// Candidate paths for a category, in the order they are tried
    pub fn candidate_paths(&self, category: Category) -> &[KeyPath] {
        self.candidates
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or(&[])
    }

    /// Append a candidate path, tried after the existing ones
    pub fn with_candidate(mut self, category: Category, path: KeyPath) -> Self {
        match self.candidates.iter_mut().find(|(c, _)| *c == category) {
            Some((_, paths)) => paths.push(path),
            None => self.candidates.push((category, vec![path])),
        }
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

/// How a category's record list was located in a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResolution {
    pub category: Category,
    /// Winning path, if any candidate yielded records
    pub matched: Option<KeyPath>,
    /// Whether the winner was a later (legacy) candidate
    pub used_fallback: bool,
    pub record_count: usize,
}

/// Extracts tagged activity records from a decoded export package
#[derive(Debug, Clone, Default)]
pub struct ExportExtractor {
    layout: ExportLayout,
}

impl ExportExtractor {
    pub fn new(layout: ExportLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    /// Decode raw upload bytes into a JSON document
    ///
    /// Fails when the bytes are not JSON or the top-level value is not an object.
    pub fn decode(bytes: &[u8]) -> Result<Value, ConvertError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| ConvertError::DecodeError(format!("invalid JSON: {}", e)))?;

        if !document.is_object() {
            return Err(ConvertError::DecodeError(format!(
                "expected a JSON object at the top level, found {}",
                value_kind(&document)
            )));
        }

        Ok(document)
    }

    /// Decode bytes and extract records in one step
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        categories: &[Category],
    ) -> Result<Vec<ActivityRecord>, ConvertError> {
        let document = Self::decode(bytes)?;
        Ok(self.extract(&document, categories))
    }

    /// Extract records for the selected categories
    ///
    /// Output is grouped Browsing, Favorite, Liked regardless of selection order;
    /// within a category the source order is kept.
    pub fn extract(&self, document: &Value, categories: &[Category]) -> Vec<ActivityRecord> {
        let mut records = Vec::new();

        for category in Category::ALL {
            if !categories.contains(&category) {
                continue;
            }

            let Some((index, entries)) = self.resolve(document, category) else {
                debug!(%category, "no records found under any candidate path");
                continue;
            };

            let path = &self.layout.candidate_paths(category)[index];
            if index > 0 {
                info!(
                    %category,
                    section = %path.section,
                    "using legacy section name"
                );
            }

            let before = records.len();
            for (position, entry) in entries.iter().enumerate() {
                match entry {
                    Value::Object(fields) => {
                        records.push(ActivityRecord::new(fields.clone(), category));
                    }
                    other => warn!(
                        %category,
                        position,
                        kind = value_kind(other),
                        "skipping non-object entry"
                    ),
                }
            }

            debug!(
                %category,
                section = %path.section,
                list_field = %path.list_field,
                count = records.len() - before,
                "extracted records"
            );
        }

        records
    }

    /// Report which candidate path each category resolves to
    pub fn inspect(&self, document: &Value) -> Vec<PathResolution> {
        Category::ALL
            .into_iter()
            .map(|category| match self.resolve(document, category) {
                Some((index, entries)) => PathResolution {
                    category,
                    matched: Some(self.layout.candidate_paths(category)[index].clone()),
                    used_fallback: index > 0,
                    record_count: entries.len(),
                },
                None => PathResolution {
                    category,
                    matched: None,
                    used_fallback: false,
                    record_count: 0,
                },
            })
            .collect()
    }

    /// Index of the first candidate holding a non-empty list, with that list
    fn resolve<'a>(&self, document: &'a Value, category: Category) -> Option<(usize, &'a [Value])> {
        let root = document.get(self.layout.root())?;

        self.layout
            .candidate_paths(category)
            .iter()
            .enumerate()
            .find_map(|(index, path)| {
                root.get(&path.section)
                    .and_then(|section| section.get(&path.list_field))
                    .and_then(Value::as_array)
                    .filter(|list| !list.is_empty())
                    .map(|list| (index, list.as_slice()))
            })
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_export() -> Value {
        json!({
            "Activity": {
                "Video Browsing History": {
                    "VideoList": [
                        { "Date": "2024-01-15 10:00:00", "Link": "https://www.tiktokv.com/share/video/1/" },
                        { "Date": "2024-01-15 10:00:40", "Link": "https://www.tiktokv.com/share/video/2/" }
                    ]
                },
                "Favorite Videos": {
                    "FavoriteVideoList": [
                        { "Date": "2024-01-16 08:00:00", "Link": "https://www.tiktokv.com/share/video/3/" }
                    ]
                },
                "Like List": {
                    "ItemFavoriteList": [
                        { "Date": "2024-02-01 12:00:00", "Link": "https://www.tiktokv.com/share/video/4/" }
                    ]
                }
            }
        })
    }

    fn links(records: &[ActivityRecord]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.field("Link").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_extract_all_categories_in_order() {
        let extractor = ExportExtractor::default();
        let records = extractor.extract(&sample_export(), &Category::ALL);

        assert_eq!(records.len(), 4);
        let categories: Vec<Category> = records.iter().map(|r| r.source_category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Browsing,
                Category::Browsing,
                Category::Favorite,
                Category::Liked
            ]
        );
        assert_eq!(records[1].field("Date"), Some(&json!("2024-01-15 10:00:40")));
    }

    #[test]
    fn test_selection_order_does_not_change_output_order() {
        let extractor = ExportExtractor::default();
        let records = extractor.extract(&sample_export(), &[Category::Liked, Category::Browsing]);

        let categories: Vec<Category> = records.iter().map(|r| r.source_category).collect();
        assert_eq!(
            categories,
            vec![Category::Browsing, Category::Browsing, Category::Liked]
        );
    }

    #[test]
    fn test_legacy_paths_match_current_paths() {
        let current = json!({
            "Activity": {
                "Favorite Videos": { "FavoriteVideoList": [{ "Date": "2023-05-01 09:00:00", "Link": "a" }] },
                "Like List": { "ItemFavoriteList": [{ "Date": "2023-05-02 09:00:00", "Link": "b" }] }
            }
        });
        let legacy = json!({
            "Activity": {
                "Favorite": { "FavoriteVideoList": [{ "Date": "2023-05-01 09:00:00", "Link": "a" }] },
                "Liked": { "ItemFavoriteList": [{ "Date": "2023-05-02 09:00:00", "Link": "b" }] }
            }
        });

        let extractor = ExportExtractor::default();
        let selection = [Category::Favorite, Category::Liked];
        assert_eq!(
            extractor.extract(&legacy, &selection),
            extractor.extract(&current, &selection)
        );
    }

    #[test]
    fn test_empty_current_section_falls_back_to_legacy() {
        let document = json!({
            "Activity": {
                "Favorite Videos": { "FavoriteVideoList": [] },
                "Favorite": { "FavoriteVideoList": [{ "Date": "2023-05-01 09:00:00", "Link": "legacy" }] }
            }
        });

        let records = ExportExtractor::default().extract(&document, &[Category::Favorite]);
        assert_eq!(links(&records), vec!["legacy"]);
    }

    #[test]
    fn test_current_path_wins_over_legacy() {
        let document = json!({
            "Activity": {
                "Like List": { "ItemFavoriteList": [{ "Date": "2023-05-01 09:00:00", "Link": "current" }] },
                "Liked": { "ItemFavoriteList": [{ "Date": "2023-05-01 09:00:00", "Link": "legacy" }] }
            }
        });

        let records = ExportExtractor::default().extract(&document, &[Category::Liked]);
        assert_eq!(links(&records), vec!["current"]);
    }

    #[test]
    fn test_missing_sections_are_empty_not_errors() {
        let extractor = ExportExtractor::default();
        assert!(extractor.extract(&json!({}), &Category::ALL).is_empty());
        assert!(extractor
            .extract(&json!({ "Activity": { "Video Browsing History": null } }), &Category::ALL)
            .is_empty());
        assert!(extractor.extract(&sample_export(), &[]).is_empty());
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let document = json!({
            "Activity": {
                "Video Browsing History": {
                    "VideoList": ["oops", { "Date": "2024-01-15 10:00:00", "Link": "ok" }, 7]
                }
            }
        });

        let records = ExportExtractor::default().extract(&document, &[Category::Browsing]);
        assert_eq!(links(&records), vec!["ok"]);
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(matches!(
            ExportExtractor::decode(b"not valid json"),
            Err(ConvertError::DecodeError(_))
        ));
        assert!(matches!(
            ExportExtractor::decode(b"[1, 2, 3]"),
            Err(ConvertError::DecodeError(_))
        ));
    }

    #[test]
    fn test_decode_accepts_byte_order_mark() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(br#"{ "Activity": {} }"#);
        assert!(ExportExtractor::decode(&bytes).is_ok());
    }

    #[test]
    fn test_inspect_reports_fallback() {
        let document = json!({
            "Activity": {
                "Video Browsing History": { "VideoList": [{ "Date": "2024-01-15 10:00:00" }] },
                "Liked": { "ItemFavoriteList": [{ "Date": "2024-01-15 10:00:00" }, { "Date": "2024-01-15 10:01:00" }] }
            }
        });

        let report = ExportExtractor::default().inspect(&document);
        assert_eq!(report.len(), 3);

        assert_eq!(
            report[0].matched,
            Some(KeyPath::new("Video Browsing History", "VideoList"))
        );
        assert!(!report[0].used_fallback);

        assert_eq!(report[1].matched, None);
        assert_eq!(report[1].record_count, 0);

        assert_eq!(report[2].matched, Some(KeyPath::new("Liked", "ItemFavoriteList")));
        assert!(report[2].used_fallback);
        assert_eq!(report[2].record_count, 2);
    }

    #[test]
    fn test_custom_layout_candidate() {
        let layout = ExportLayout::default()
            .with_candidate(Category::Browsing, KeyPath::new("Watch History", "VideoList"));
        let document = json!({
            "Activity": { "Watch History": { "VideoList": [{ "Date": "2024-01-15 10:00:00", "Link": "new" }] } }
        });

        let records = ExportExtractor::new(layout).extract(&document, &[Category::Browsing]);
        assert_eq!(links(&records), vec!["new"]);
    }
}
