use crate::domain::document::{DetectedLanguage, Document, Layout};
use crate::domain::model::GcsUri;
use crate::domain::ports::DocumentProcessor;
use crate::utils::error::{Result, ServerError};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldText {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFormField {
    pub page: usize,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrPage {
    pub page_number: usize,
    pub text: String,
    pub form_fields: Vec<FieldText>,
    pub confidence: Option<f64>,
    pub detected_languages: Vec<DetectedLanguage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    pub full_text: String,
    pub pages: Vec<OcrPage>,
    pub form_fields: Vec<PageFormField>,
    pub confidence_score: Option<f64>,
    pub total_pages: usize,
    pub total_characters: usize,
    pub document_uri: String,
    pub mime_type: String,
}

/// `text[start..end]` counted in chars; out-of-range bounds are clamped.
fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| {
        text.char_indices()
            .nth(n)
            .map(|(idx, _)| idx)
            .unwrap_or(text.len())
    };
    let start = byte_at(start);
    let end = byte_at(end);
    if start >= end {
        ""
    } else {
        &text[start..end]
    }
}

fn anchored_text(layout: &Layout, text: &str) -> Option<String> {
    let anchor = layout.text_anchor.as_ref()?;
    let total = text.chars().count();
    Some(
        anchor
            .text_segments
            .iter()
            .map(|segment| {
                char_slice(
                    text,
                    segment.start_index.unwrap_or(0),
                    segment.end_index.unwrap_or(total),
                )
            })
            .collect(),
    )
}

/// 取得文件元素對應的文字（去除前後空白）
pub fn get_text(element: Option<&Layout>, text: &str) -> String {
    element
        .and_then(|layout| anchored_text(layout, text))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn extract_text_with_pages(document: &Document) -> OcrResult {
    let mut pages = Vec::with_capacity(document.pages.len());
    let mut form_fields = Vec::new();
    let mut confidence_score = None;

    for (index, page) in document.pages.iter().enumerate() {
        let page_number = index + 1;

        let confidence = page
            .layout
            .as_ref()
            .map(|layout| layout.confidence.unwrap_or(0.0));
        if confidence_score.is_none() {
            confidence_score = confidence;
        }

        let text = match page
            .layout
            .as_ref()
            .and_then(|layout| anchored_text(layout, &document.text))
        {
            Some(text) => text,
            // 單頁文件沒有錨點時使用全文
            None if document.pages.len() == 1 => document.text.clone(),
            None => String::new(),
        };

        let mut page_fields = Vec::with_capacity(page.form_fields.len());
        for field in &page.form_fields {
            let name = get_text(field.field_name.as_ref(), &document.text);
            let value = get_text(field.field_value.as_ref(), &document.text);
            form_fields.push(PageFormField {
                page: page_number,
                name: name.clone(),
                value: value.clone(),
            });
            page_fields.push(FieldText { name, value });
        }

        pages.push(OcrPage {
            page_number,
            text,
            form_fields: page_fields,
            confidence,
            detected_languages: page.detected_languages.clone(),
        });
    }

    OcrResult {
        full_text: document.text.clone(),
        total_pages: pages.len(),
        total_characters: document.text.chars().count(),
        pages,
        form_fields,
        confidence_score,
        document_uri: document.uri.clone().unwrap_or_default(),
        mime_type: document.mime_type.clone().unwrap_or_default(),
    }
}

/// Human-readable reason for a failed OCR run.
pub fn failure_message(err: &ServerError) -> String {
    match err {
        ServerError::ValidationError { message } => message.clone(),
        other => format!("Document processing failed: {}", other),
    }
}

pub struct OcrService {
    processor: Arc<dyn DocumentProcessor>,
}

impl OcrService {
    pub fn new(processor: Arc<dyn DocumentProcessor>) -> Self {
        Self { processor }
    }

    pub async fn process_pdf(&self, gcs_uri: &str) -> Result<OcrResult> {
        if gcs_uri.trim().is_empty() {
            return Err(ServerError::validation("Invalid GCS URI provided"));
        }
        let uri = GcsUri::parse(gcs_uri).ok_or_else(|| {
            ServerError::validation("Input must be a GCS URI starting with 'gs://'")
        })?;

        let document = self.processor.process(&uri).await?;
        Ok(extract_text_with_pages(&document))
    }
}
