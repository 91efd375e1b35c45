//! Core use-case services.
//!
//! # Responsibility
//! - Wrap aggregate entry points into transactional use-case APIs.
//! - Keep CLI and embedding layers decoupled from storage details.

pub mod vocabulary_service;

pub use vocabulary_service::{ServiceResult, VocabularyService, VocabularyServiceError};
