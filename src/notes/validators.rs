// src/notes/validators.rs

use super::models::CreateNoteRequest;
use crate::common::{ValidationResult, Validator};

pub const MAX_NOTE_LENGTH: usize = 2000;

pub struct NoteValidator;

impl Validator<CreateNoteRequest> for NoteValidator {
    fn validate(&self, data: &CreateNoteRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        let len = data.content.trim().chars().count();
        if len == 0 {
            result.add_error("content", "Note content is required");
        } else if len > MAX_NOTE_LENGTH {
            result.add_error("content", "Note must be at most 2000 characters");
        }

        result
    }
}
