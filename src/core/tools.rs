//! The four MCP tools.
//!
//! Every tool answers with a JSON object; failures are reported inside that object
//! (`{"error": ...}`) so clients always get a structured result back.

use crate::adapters::local::LocalStorage;
use crate::core::chat::LegalChat;
use crate::core::ocr::{failure_message, OcrService};
use crate::core::precedents::{PrecedentFinder, DEFAULT_JURISDICTION};
use crate::domain::model::GcsUri;
use crate::domain::ports::{ObjectStore, Storage};
use crate::utils::error::Result;
use crate::utils::logger::preview;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

pub const UPLOAD_PDF: &str = "upload_pdf";
pub const PDF_QA: &str = "pdf_qa";
pub const EXTRACT_TEXT_FROM_PDF: &str = "extract_text_from_pdf";
pub const FIND_LEGAL_PRECEDENTS: &str = "find_legal_precedents";

#[derive(Error, Debug, PartialEq)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct UploadPdfArgs {
    pub filename: String,
    pub file_data: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PdfQaArgs {
    pub question: String,
    #[serde(default, rename = "gsUri")]
    pub gs_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractTextArgs {
    pub gcs_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct FindPrecedentsArgs {
    pub clause: String,
    #[serde(default)]
    pub location: Option<String>,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: UPLOAD_PDF,
            description: "Upload a base64-encoded PDF to Google Cloud Storage and return its gs:// URI.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string", "title": "Filename"},
                    "file_data": {"type": "string", "title": "File Data", "description": "Base64 data, optionally as a data: URL"},
                    "bucket_name": {"anyOf": [{"type": "string"}, {"type": "null"}], "default": null, "title": "Bucket Name"}
                },
                "required": ["filename", "file_data"]
            }),
        },
        ToolDefinition {
            name: PDF_QA,
            description: "Processes a question about a PDF and ensures the response is a dictionary.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "title": "Question"},
                    "gsUri": {"anyOf": [{"type": "string"}, {"type": "null"}], "default": null, "title": "Gsuri"}
                },
                "required": ["question"]
            }),
        },
        ToolDefinition {
            name: EXTRACT_TEXT_FROM_PDF,
            description: "Extract text from a PDF document stored in Google Cloud Storage using Document AI. Returns structured text data with page-wise breakdown and form fields.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "gcs_uri": {"type": "string", "title": "Gcs Uri", "description": "The GCS URI of the PDF file (e.g., 'gs://bucket-name/file.pdf')"}
                },
                "required": ["gcs_uri"]
            }),
        },
        ToolDefinition {
            name: FIND_LEGAL_PRECEDENTS,
            description: "Find relevant legal precedents for a given clause and jurisdiction.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "clause": {"type": "string", "title": "Clause", "description": "The legal clause text to find precedents for"},
                    "location": {"type": "string", "default": DEFAULT_JURISDICTION, "title": "Location", "description": "The jurisdiction/location (e.g., \"US\", \"California\", \"India\", \"UK\", \"EU\")"}
                },
                "required": ["clause"]
            }),
        },
    ]
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> std::result::Result<T, ToolCallError> {
    // 未帶參數時視為空物件
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

fn error_value(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// A bare file name: no directories, no parent references.
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

/// Drops a `data:<mime>;base64,` prefix and any whitespace.
fn strip_data_url(file_data: &str) -> String {
    let payload = match file_data.split_once(',') {
        Some((_, rest)) if file_data.starts_with("data:") => rest,
        _ => file_data,
    };
    payload.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

pub struct LegalTools {
    uploads: LocalStorage,
    object_store: Arc<dyn ObjectStore>,
    chat: LegalChat,
    ocr: OcrService,
    precedents: PrecedentFinder,
    default_bucket: String,
}

impl LegalTools {
    pub fn new(
        uploads: LocalStorage,
        object_store: Arc<dyn ObjectStore>,
        chat: LegalChat,
        ocr: OcrService,
        precedents: PrecedentFinder,
        default_bucket: impl Into<String>,
    ) -> Self {
        Self {
            uploads,
            object_store,
            chat,
            ocr,
            precedents,
            default_bucket: default_bucket.into(),
        }
    }

    pub async fn call(&self, name: &str, arguments: Value) -> std::result::Result<Value, ToolCallError> {
        match name {
            UPLOAD_PDF => Ok(self.upload_pdf(parse_args(name, arguments)?).await),
            PDF_QA => Ok(self.pdf_qa(parse_args(name, arguments)?).await),
            EXTRACT_TEXT_FROM_PDF => Ok(self.extract_text_from_pdf(parse_args(name, arguments)?).await),
            FIND_LEGAL_PRECEDENTS => Ok(self.find_legal_precedents(parse_args(name, arguments)?).await),
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }

    pub async fn upload_pdf(&self, args: UploadPdfArgs) -> Value {
        tracing::info!("upload_pdf called with filename: {}", args.filename);
        match self.try_upload_pdf(&args).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("upload_pdf failed: {} (category: {:?})", e, e.category());
                error_value(e.to_string())
            }
        }
    }

    async fn try_upload_pdf(&self, args: &UploadPdfArgs) -> Result<Value> {
        if !args.filename.to_lowercase().ends_with(".pdf") {
            return Ok(error_value("Only PDFs allowed"));
        }
        if !is_plain_filename(&args.filename) {
            return Ok(error_value("Filename must not contain path separators"));
        }

        let raw = STANDARD.decode(strip_data_url(&args.file_data))?;
        let local_path = self.uploads.write_file(&args.filename, &raw).await?;
        tracing::info!("📁 PDF saved locally: {}", local_path);

        let bucket = args
            .bucket_name
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(&self.default_bucket);
        let gcs_uri = self
            .object_store
            .upload(bucket, &args.filename, raw, "application/pdf")
            .await?;
        tracing::info!("☁️ PDF uploaded to GCS: {}", gcs_uri);

        Ok(json!({ "message": "File uploaded to GCS", "gcs_uri": gcs_uri.to_string() }))
    }

    pub async fn pdf_qa(&self, args: PdfQaArgs) -> Value {
        tracing::info!(
            "pdf_qa called with question: {}... gsUri: {:?}",
            preview(&args.question, 100),
            args.gs_uri
        );
        if args.question.is_empty() {
            return error_value("question required");
        }

        // 每次呼叫都是新的對話
        let mut history = Vec::new();
        match self
            .chat
            .automated_chat(&args.question, args.gs_uri.as_deref(), &mut history)
            .await
        {
            Ok(answer) => json!({ "answer": answer }),
            Err(e) => {
                tracing::error!("pdf_qa failed: {}", e);
                error_value(e.to_string())
            }
        }
    }

    pub async fn extract_text_from_pdf(&self, args: ExtractTextArgs) -> Value {
        tracing::info!("extract_text_from_pdf called with gcs_uri: {}", args.gcs_uri);

        if args.gcs_uri.is_empty() {
            return error_value("gcs_uri required");
        }
        if !args.gcs_uri.starts_with(GcsUri::SCHEME) {
            return error_value("Invalid GCS URI format. Must start with 'gs://'");
        }

        match self.ocr.process_pdf(&args.gcs_uri).await {
            Ok(result) => {
                tracing::info!(
                    "OCR processing successful. Extracted {} characters from {} pages",
                    result.total_characters,
                    result.total_pages
                );
                json!({
                    "success": true,
                    "full_text": result.full_text,
                    "pages": result.pages,
                    "form_fields": result.form_fields,
                    "confidence_score": result.confidence_score,
                    "total_pages": result.total_pages,
                    "total_characters": result.total_characters,
                })
            }
            Err(e) => {
                let message = failure_message(&e);
                tracing::error!("OCR processing failed: {}", message);
                error_value(message)
            }
        }
    }

    pub async fn find_legal_precedents(&self, args: FindPrecedentsArgs) -> Value {
        let clause = args.clause;
        let location = match args.location {
            Some(location) if !location.trim().is_empty() => location,
            _ => DEFAULT_JURISDICTION.to_string(),
        };
        tracing::info!(
            "find_legal_precedents called with clause: {}... location: {}",
            preview(&clause, 50),
            location
        );

        if clause.trim().is_empty() {
            return error_value("clause text is required");
        }

        match self.precedents.find_precedents(&clause, &location).await {
            Ok(precedents) if !precedents.is_empty() => {
                tracing::info!("Precedents found successfully for location: {}", location);
                json!({
                    "success": true,
                    "clause": clause,
                    "location": location,
                    "precedents": precedents,
                    "error": null,
                })
            }
            Ok(_) => {
                tracing::warn!("No precedents returned for location: {}", location);
                json!({
                    "success": false,
                    "error": "No precedents found or analysis failed",
                    "clause": clause,
                    "location": location,
                    "precedents": "",
                })
            }
            Err(e) => {
                tracing::error!("find_legal_precedents failed: {}", e);
                json!({
                    "success": false,
                    "error": format!("Precedent analysis failed: {}", e),
                    "clause": clause,
                    "location": location,
                    "precedents": "",
                })
            }
        }
    }
}
