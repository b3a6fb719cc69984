//! Tests for notes module
//!
//! These tests verify:
//! - Note ownership and ordering
//! - Content validation
//! - Session and CSRF enforcement on the HTTP routes

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::app::build_router;
    use crate::common::test_support::*;
    use crate::common::{ApiError, Validator};
    use crate::services::google::StubVerifier;
    use axum::http::StatusCode;
    use chrono::Duration;
    use models::CreateNoteRequest;
    use serde_json::json;
    use services::NotesService;
    use validators::NoteValidator;

    #[test]
    fn test_note_content_validation() {
        let valid = CreateNoteRequest {
            content: "Buy milk".to_string(),
        };
        assert!(NoteValidator.validate(&valid).is_valid);

        let blank = CreateNoteRequest {
            content: "   ".to_string(),
        };
        assert!(!NoteValidator.validate(&blank).is_valid);

        let long = CreateNoteRequest {
            content: "x".repeat(2001),
        };
        let result = NoteValidator.validate(&long);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].field, "content");

        let max = CreateNoteRequest {
            content: "x".repeat(2000),
        };
        assert!(NoteValidator.validate(&max).is_valid);
    }

    #[tokio::test]
    async fn test_notes_are_scoped_and_newest_first() {
        let pool = test_pool().await;
        let ann = insert_user(&pool, "ann@x.com").await;
        let bob = insert_user(&pool, "bob@x.com").await;
        let service = NotesService::new(pool);

        service.create_note(&ann, "first", 1_000).await.unwrap();
        service.create_note(&ann, "second", 2_000).await.unwrap();
        service.create_note(&bob, "other", 3_000).await.unwrap();

        let notes = service.list_notes(&ann).await.unwrap();
        let contents: Vec<&str> = notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(notes.iter().all(|n| n.user_id == ann));
    }

    #[tokio::test]
    async fn test_delete_foreign_note_is_not_found() {
        let pool = test_pool().await;
        let ann = insert_user(&pool, "ann@x.com").await;
        let bob = insert_user(&pool, "bob@x.com").await;
        let service = NotesService::new(pool);
        let note = service.create_note(&ann, "mine", 1_000).await.unwrap();

        let err = service.delete_note(&bob, &note.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg == "Note not found"));
        assert_eq!(service.list_notes(&ann).await.unwrap().len(), 1);

        service.delete_note(&ann, &note.id).await.unwrap();
        assert!(service.list_notes(&ann).await.unwrap().is_empty());

        let err = service.delete_note(&ann, &note.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_note_serializes_timestamp_as_rfc3339() {
        let note = models::Note {
            id: "N1".to_string(),
            user_id: "U1".to_string(),
            content: "hello".to_string(),
            created_at: 0,
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["created_at"], "1970-01-01T00:00:00.000Z");
    }

    /// Signs a fresh user in. Returns the cookie header and the CSRF token
    /// to echo.
    async fn session_cookie(app: &TestApp) -> (String, String) {
        let user_id = insert_user(&app.state.db, "a@x.com").await;
        let issued = app
            .state
            .sessions
            .issue(&user_id, "a@x.com", false)
            .unwrap();
        let csrf = crate::auth::csrf::issue_token();
        (format!("token={}; csrf={}", issued.token, csrf), csrf)
    }

    #[tokio::test]
    async fn test_notes_require_session() {
        let app = test_app(StubVerifier::rejecting()).await;
        let router = build_router(app.state.clone());

        let (status, _, body) = send(&router, get_request("/api/notes", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");

        let (status, _, body) =
            send(&router, get_request("/api/notes", Some("token=not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");

        // No session beats a missing CSRF token.
        let (status, _, body) = send(
            &router,
            json_request("POST", "/api/notes", json!({ "content": "hi" }), None, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let app = test_app(StubVerifier::rejecting()).await;
        let router = build_router(app.state.clone());
        let (cookie, _) = session_cookie(&app).await;

        app.clock.advance(Duration::minutes(30));
        let (status, _, body) = send(&router, get_request("/api/notes", Some(&cookie))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_unsafe_methods_require_matching_csrf() {
        let app = test_app(StubVerifier::rejecting()).await;
        let router = build_router(app.state.clone());
        let (cookie, csrf) = session_cookie(&app).await;

        // GET is exempt.
        let (status, _, body) = send(&router, get_request("/api/notes", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notes"], json!([]));

        let (status, _, body) = send(
            &router,
            json_request("POST", "/api/notes", json!({ "content": "hi" }), Some(&cookie), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CSRF_MISMATCH");

        let (status, _, body) = send(
            &router,
            json_request(
                "POST",
                "/api/notes",
                json!({ "content": "hi" }),
                Some(&cookie),
                Some("0123456789abcdef0123456789abcdef"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CSRF_MISMATCH");

        let (status, _, body) = send(
            &router,
            json_request(
                "POST",
                "/api/notes",
                json!({ "content": "  hi  " }),
                Some(&cookie),
                Some(&csrf),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["note"]["content"], "hi");
        let note_id = body["note"]["id"].as_str().unwrap().to_string();

        let delete = |csrf: Option<&str>| {
            json_request(
                "DELETE",
                &format!("/api/notes/{}", note_id),
                json!({}),
                Some(&cookie),
                csrf,
            )
        };

        let (status, _, _) = send(&router, delete(None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = send(&router, delete(Some(&csrf))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let (status, _, body) = send(&router, delete(Some(&csrf))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Note not found");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_content() {
        let app = test_app(StubVerifier::rejecting()).await;
        let router = build_router(app.state.clone());
        let (cookie, csrf) = session_cookie(&app).await;

        let (status, _, body) = send(
            &router,
            json_request(
                "POST",
                "/api/notes",
                json!({ "content": "" }),
                Some(&cookie),
                Some(&csrf),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
