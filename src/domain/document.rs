//! Document AI `Document` as returned by `processors/*:process`.
//!
//! Only the fields the OCR extraction reads are modelled; everything else in the
//! response is ignored.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub detected_languages: Vec<DetectedLanguage>,
    #[serde(default)]
    pub form_fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub text_anchor: Option<TextAnchor>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    #[serde(default)]
    pub text_segments: Vec<TextSegment>,
}

/// Indexes are int64 in the API, which the JSON mapping renders as strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default, deserialize_with = "deserialize_index")]
    pub start_index: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_index")]
    pub end_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLanguage {
    #[serde(rename(serialize = "language_code"))]
    pub language_code: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    #[serde(default)]
    pub field_name: Option<Layout>,
    #[serde(default)]
    pub field_value: Option<Layout>,
}

fn deserialize_index<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Number(u64),
        Text(String),
    }

    match Option::<Index>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Index::Number(n)) => Ok(Some(n as usize)),
        Some(Index::Text(s)) => s
            .parse::<usize>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_accept_strings_and_numbers() {
        let segment: TextSegment =
            serde_json::from_value(serde_json::json!({"startIndex": "12", "endIndex": 40}))
                .unwrap();
        assert_eq!(segment.start_index, Some(12));
        assert_eq!(segment.end_index, Some(40));

        let segment: TextSegment =
            serde_json::from_value(serde_json::json!({"endIndex": "7"})).unwrap();
        assert_eq!(segment.start_index, None);
        assert_eq!(segment.end_index, Some(7));

        assert!(serde_json::from_value::<TextSegment>(
            serde_json::json!({"startIndex": "abc"})
        )
        .is_err());
    }

    #[test]
    fn test_detected_language_renames_on_output() {
        let lang: DetectedLanguage = serde_json::from_value(
            serde_json::json!({"languageCode": "en", "confidence": 0.98}),
        )
        .unwrap();
        let out = serde_json::to_value(&lang).unwrap();
        assert_eq!(out, serde_json::json!({"language_code": "en", "confidence": 0.98}));
    }
}
