//! Legal-advice chat on top of Gemini.
//!
//! Builds the conversation (history plus the current turn), applies the fixed persona and
//! generation settings, and flattens the streamed answer into text.

use crate::adapters::local::LocalStorage;
use crate::domain::model::{
    ChatMessage, ChatRole, Content, GenerateRequest, GenerateResponse, GenerationConfig,
    MessageContent, Part, SafetySetting,
};
use crate::domain::ports::{GenerativeModel, GlossaryLookup, Storage};
use crate::utils::error::{Result, ServerError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

pub const SYSTEM_INSTRUCTION: &str = "you are a highly qualified legal professional, renowned for your sharp wit, unparalleled expertise, and ability to win even the toughest cases. As a top-tier legal advisor and document assistant, you are well-versed in all areas of law, including corporate, criminal, civil, tax, intellectual property, international, and regulatory law in the Indian jurisdiction specifically. You provide precise, actionable legal advice, identifying legitimate strategies, exemptions, or loopholes to minimize penalties or liabilities when requested, without ever endorsing illegal actions.";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

const PDF_MIME: &str = "application/pdf";

pub fn generation_config() -> GenerationConfig {
    GenerationConfig {
        temperature: 0.2,
        top_p: 0.95,
        max_output_tokens: 2000,
    }
}

pub fn safety_settings() -> Vec<SafetySetting> {
    SAFETY_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "OFF".to_string(),
        })
        .collect()
}

pub fn guess_mime_type(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => PDF_MIME,
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn looks_like_path(item: &str) -> bool {
    item.starts_with('/') || item.starts_with("./") || item.starts_with("../")
}

/// Missing files and paths outside the upload directory are kept as plain text.
fn is_unreadable_path(err: &ServerError) -> bool {
    match err {
        ServerError::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
        ServerError::ValidationError { .. } => true,
        _ => false,
    }
}

/// The question part of a "what is ..." query, lowercased.
pub fn term_query(question: &str) -> Option<String> {
    let lowered = question.to_lowercase();
    if !lowered.starts_with("what is") {
        return None;
    }
    let term = lowered
        .replace("what is", "")
        .trim_matches(|c: char| c == '?' || c == ' ' || c == '.')
        .to_string();
    Some(term)
}

/// Text is kept as-is, inline data becomes an embeddable `<img>` tag.
pub fn render_part(part: &Part) -> Option<String> {
    if let Some(text) = part.text.as_ref().filter(|t| !t.is_empty()) {
        return Some(text.clone());
    }
    part.inline_data
        .as_ref()
        .map(|blob| format!("<img src=\"data:{};base64,{}\">", blob.mime_type, blob.data))
}

/// 串接每個 chunk 第一個候選的文字
pub fn collect_text(chunks: &[GenerateResponse]) -> String {
    chunks
        .iter()
        .filter_map(GenerateResponse::first_content)
        .flat_map(|content| content.parts.iter().filter_map(render_part))
        .collect()
}

pub struct LegalChat {
    model: Arc<dyn GenerativeModel>,
    glossary: Option<Arc<dyn GlossaryLookup>>,
    files: LocalStorage,
}

impl LegalChat {
    /// Local attachments are read from `files` (the upload directory) only.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        glossary: Option<Arc<dyn GlossaryLookup>>,
        files: LocalStorage,
    ) -> Self {
        Self {
            model,
            glossary,
            files,
        }
    }

    async fn part_from_file(&self, path: &str) -> Result<Part> {
        if path.starts_with("gs://") {
            return Ok(Part::file_uri(PDF_MIME, path));
        }
        let data = self.files.read_file(path).await?;
        Ok(Part::inline(guess_mime_type(path), STANDARD.encode(data)))
    }

    pub async fn parts_from_message(&self, message: &MessageContent) -> Result<Vec<Part>> {
        let mut parts = Vec::new();

        match message {
            MessageContent::Text(text) => {
                if !text.is_empty() {
                    parts.push(Part::text(text.clone()));
                }
            }
            MessageContent::WithFiles { text, files } => {
                if !text.is_empty() {
                    parts.push(Part::text(text.clone()));
                }
                for file in files {
                    parts.push(self.part_from_file(file).await?);
                }
            }
            MessageContent::InlineImage { mime_type, data } => {
                parts.push(Part::inline(mime_type.clone(), STANDARD.encode(data)));
            }
            MessageContent::Items(items) => {
                for item in items {
                    if looks_like_path(item) {
                        match self.part_from_file(item).await {
                            Ok(part) => parts.push(part),
                            Err(e) if is_unreadable_path(&e) => parts.push(Part::text(item.clone())),
                            Err(e) => return Err(e),
                        }
                    } else {
                        parts.push(Part::text(item.clone()));
                    }
                }
            }
        }

        // 空訊息會被模型拒絕
        if parts.is_empty() {
            parts.push(Part::text(" "));
        }

        Ok(parts)
    }

    pub async fn build_contents(
        &self,
        history: &[ChatMessage],
        current: &MessageContent,
    ) -> Result<Vec<Content>> {
        let mut contents = Vec::with_capacity(history.len() + 1);

        for previous in history {
            let parts = self.parts_from_message(&previous.content).await?;
            if !parts.is_empty() {
                contents.push(Content {
                    role: Some(previous.role),
                    parts,
                });
            }
        }

        contents.push(Content {
            role: Some(ChatRole::User),
            parts: self.parts_from_message(current).await?,
        });

        Ok(contents)
    }

    pub async fn build_request(
        &self,
        history: &[ChatMessage],
        current: &MessageContent,
    ) -> Result<GenerateRequest> {
        Ok(GenerateRequest {
            contents: self.build_contents(history, current).await?,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            }),
            generation_config: Some(generation_config()),
            safety_settings: safety_settings(),
        })
    }

    /// One answer for `message` given the earlier turns in `history`.
    pub async fn generate_legal_advice(
        &self,
        message: &MessageContent,
        history: &[ChatMessage],
    ) -> Result<String> {
        if let (MessageContent::Text(question), Some(glossary)) = (message, &self.glossary) {
            if let Some(term) = term_query(question) {
                if let Some(definition) = glossary.define(&term).await {
                    tracing::debug!("Answered '{}' from the glossary", term);
                    return Ok(definition);
                }
            }
        }

        let request = self.build_request(history, message).await?;
        let chunks = self.model.generate_stream(&request).await?;
        Ok(collect_text(&chunks))
    }

    /// Asks `question` (optionally about `file_path`) and records both turns in `history`.
    pub async fn automated_chat(
        &self,
        question: &str,
        file_path: Option<&str>,
        history: &mut Vec<ChatMessage>,
    ) -> Result<String> {
        let user_input = match file_path.filter(|p| !p.is_empty()) {
            Some(path) => MessageContent::WithFiles {
                text: question.to_string(),
                files: vec![path.to_string()],
            },
            None => MessageContent::Text(question.to_string()),
        };

        let answer = self.generate_legal_advice(&user_input, history).await?;

        history.push(ChatMessage::user(user_input));
        history.push(ChatMessage::model(answer.clone()));
        Ok(answer)
    }
}
