pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::usage::plans::{plan_config, PlanType};
use crate::{attachments, chat, citations, plus, quiz, search, sheets, tools, usage};

/// Largest upload any plan allows. Per-plan limits are checked in the handler.
fn max_upload_bytes() -> usize {
    let mb = plan_config(PlanType::Plus).limits.max_file_size_mb as usize;
    mb * 1024 * 1024
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat
        .route("/api/chat", post(chat::handlers::handle_chat))
        .route(
            "/api/chat/sessions",
            get(chat::handlers::handle_list_sessions),
        )
        .route(
            "/api/chat/sessions/:id",
            delete(chat::handlers::handle_delete_session),
        )
        .route(
            "/api/chat/sessions/:id/messages",
            get(chat::handlers::handle_session_messages),
        )
        // Tools
        .route("/api/tools", get(tools::handlers::handle_list_tools))
        .route("/api/tools/:id", get(tools::handlers::handle_get_tool))
        .route(
            "/api/tools/:id/process",
            post(tools::handlers::handle_process_tool),
        )
        // Search
        .route("/api/search/web", post(search::handlers::handle_web_search))
        .route(
            "/api/search/history",
            get(search::handlers::handle_list_history).delete(search::handlers::handle_clear_history),
        )
        .route(
            "/api/search/bookmarks",
            get(search::handlers::handle_list_bookmarks).post(search::handlers::handle_save_bookmark),
        )
        .route(
            "/api/search/bookmarks/:id",
            delete(search::handlers::handle_delete_bookmark),
        )
        .route(
            "/api/search/citations",
            post(citations::handlers::handle_citations),
        )
        // Quiz
        .route("/api/quiz/generate", post(quiz::handlers::handle_generate))
        .route("/api/quiz/grade", post(quiz::handlers::handle_grade))
        .route("/api/quiz/history", get(quiz::handlers::handle_history))
        .route("/api/quiz/stats", get(quiz::handlers::handle_stats))
        // Sheets
        .route("/api/sheets/create", post(sheets::handlers::handle_create))
        .route("/api/sheets/edit", post(sheets::handlers::handle_edit))
        .route(
            "/api/sheets/edit-history",
            get(sheets::handlers::handle_edit_history),
        )
        .route("/api/sheets/:id", get(sheets::handlers::handle_get_sheet))
        .route(
            "/api/sheets/:id/export",
            post(sheets::handlers::handle_export),
        )
        .route(
            "/api/sheets/:id/find-replace",
            post(sheets::handlers::handle_find_replace),
        )
        .route("/api/sheets/:id/view", get(sheets::handlers::handle_view))
        .route(
            "/api/sheets/:id/rows",
            post(sheets::handlers::handle_insert_rows),
        )
        // Usage
        .route("/api/user/usage", get(usage::handlers::handle_usage))
        .route(
            "/api/user/web-search-status",
            get(usage::handlers::handle_web_search_status),
        )
        .route("/api/user/plan", patch(usage::handlers::handle_update_plan))
        // Attachments
        .route(
            "/api/attachments",
            post(attachments::handlers::handle_upload)
                .layer(DefaultBodyLimit::max(max_upload_bytes())),
        )
        // Plus
        .route(
            "/api/plus/api-keys",
            get(plus::api_keys::handle_list_keys).post(plus::api_keys::handle_create_key),
        )
        .route(
            "/api/plus/api-keys/:id",
            delete(plus::api_keys::handle_delete_key),
        )
        .route(
            "/api/plus/team",
            get(plus::team::handle_list_team).post(plus::team::handle_invite),
        )
        .route(
            "/api/plus/team/:id",
            delete(plus::team::handle_remove_member),
        )
        .route(
            "/api/plus/training",
            get(plus::training::handle_list_jobs).post(plus::training::handle_create_job),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let app: Router = Router::new().route("/health", get(health::health_handler));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "tera-api");
    }

    #[tokio::test]
    async fn test_tool_catalog_routes() {
        let app: Router = Router::new()
            .route("/api/tools", get(tools::handlers::handle_list_tools))
            .route("/api/tools/:id", get(tools::handlers::handle_get_tool));

        let list = app
            .clone()
            .oneshot(Request::builder().uri("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(list.status(), 200);

        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/api/tools/essay-grader")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_citations_route_rejects_empty_sources() {
        let app: Router = Router::new().route(
            "/api/search/citations",
            post(citations::handlers::handle_citations),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/search/citations")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"sources":[],"format":"mla"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[test]
    fn test_upload_limit_covers_largest_plan() {
        assert_eq!(max_upload_bytes(), 2000 * 1024 * 1024);
    }
}
