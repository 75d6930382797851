pub mod chat;
pub mod ocr;
pub mod precedents;
pub mod tools;

pub use crate::domain::model::{ChatMessage, GcsUri, MessageContent};
pub use crate::domain::ports::{
    DocumentProcessor, GenerativeModel, GlossaryLookup, ObjectStore, Storage, TokenProvider,
};
pub use crate::utils::error::Result;
