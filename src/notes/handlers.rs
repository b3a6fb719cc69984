use super::models::CreateNoteRequest;
use super::services::NotesService;
use super::validators::NoteValidator;
use crate::auth::AuthedUser;
use crate::common::{safe_email_log, ApiError, ApiJson, AppState, Validator};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// GET /api/notes - List the caller's notes
pub async fn list_notes(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let notes = NotesService::new(state.db.clone())
        .list_notes(&user.id)
        .await?;
    Ok(Json(json!({ "ok": true, "notes": notes })))
}

/// POST /api/notes - Create a note
pub async fn create_note(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthedUser,
    ApiJson(request): ApiJson<CreateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    NoteValidator.validate(&request).into_result()?;

    let note = NotesService::new(state.db.clone())
        .create_note(
            &user.id,
            request.content.trim(),
            state.clock.now().timestamp_millis(),
        )
        .await?;

    info!(
        note_id = %note.id,
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "Note created"
    );

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "note": note }))))
}

/// DELETE /api/notes/:id - Delete one of the caller's notes
pub async fn delete_note(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthedUser,
    Path(note_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    NotesService::new(state.db.clone())
        .delete_note(&user.id, &note_id)
        .await?;
    info!(
        note_id = %note_id,
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "Note deleted"
    );
    Ok(Json(json!({ "ok": true })))
}
