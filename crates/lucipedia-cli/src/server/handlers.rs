use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use lucipedia_core::Error;
use lucipedia_core::orchestrator::DEFAULT_SEARCH_LIMIT;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use super::render;

/// Map a library error to a status code and the message shown to the visitor.
///
/// Only the empty-store case gets its own message; the status code still
/// follows the error kind.
#[must_use]
pub fn status_for(err: &Error) -> (StatusCode, &'static str) {
    if err.is_no_pages() {
        return (StatusCode::NOT_FOUND, render::NO_PAGES_MESSAGE);
    }
    let status = if err.is_client_fault() {
        StatusCode::BAD_REQUEST
    } else if err.is_blocked() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else if err.category() == "timeout" {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, render::GENERIC_ERROR_MESSAGE)
}

fn status_label(status: StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or_default())
}

async fn page_count(state: &AppState) -> Option<usize> {
    match state.service.page_count().await {
        Ok(count) => Some(count),
        Err(err) => {
            warn!(error = %err, "counting pages for layout failed");
            None
        },
    }
}

async fn error_response(state: &AppState, operation: &str, err: &Error) -> Response {
    let (status, message) = status_for(err);
    if status.is_server_error() {
        error!(operation, category = err.category(), error = %err, "request failed");
    } else {
        warn!(operation, category = err.category(), error = %err, "request rejected");
    }
    let body = render::message_page(&status_label(status), message, page_count(state).await);
    (status, Html(body)).into_response()
}

/// `GET /`: the newest page, or first-run guidance.
pub async fn home(State(state): State<AppState>) -> Response {
    match state.service.most_recent_page().await {
        Ok(page) => {
            let count = page_count(&state).await;
            Html(render::wiki_page(&page.slug, &page.markup, count)).into_response()
        },
        Err(err) if err.is_no_pages() => Html(render::empty_home(Some(0))).into_response(),
        Err(err) => error_response(&state, "loading home page", &err).await,
    }
}

/// `GET /most-recent`: the newest page, 404 with guidance when empty.
pub async fn most_recent(State(state): State<AppState>) -> Response {
    match state.service.most_recent_page().await {
        Ok(page) => {
            let count = page_count(&state).await;
            Html(render::wiki_page(&page.slug, &page.markup, count)).into_response()
        },
        Err(err) => error_response(&state, "loading most recent page", &err).await,
    }
}

/// `GET /wiki/:slug`: serve or generate.
pub async fn wiki(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.service.get_page(&slug).await {
        Ok(markup) => {
            let count = page_count(&state).await;
            Html(render::wiki_page(&slug, &markup, count)).into_response()
        },
        Err(err) => error_response(&state, "loading wiki page", &err).await,
    }
}

/// `GET /random`: 302 to a stored page.
pub async fn random(State(state): State<AppState>) -> Response {
    match state.service.random_slug().await {
        Ok(slug) => {
            (StatusCode::FOUND, [(header::LOCATION, render::wiki_path(&slug))]).into_response()
        },
        Err(err) => error_response(&state, "selecting random page", &err).await,
    }
}

/// `GET /all`: every stored slug.
pub async fn all_pages(State(state): State<AppState>) -> Response {
    match state.service.list_pages().await {
        Ok(pages) => {
            let slugs: Vec<String> = pages.into_iter().map(|page| page.slug).collect();
            let count = Some(slugs.len());
            Html(render::all_pages(&slugs, count)).into_response()
        },
        Err(err) => error_response(&state, "listing wiki pages", &err).await,
    }
}

/// Query string of `/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Free-text query; absent or blank renders the empty form.
    #[serde(default)]
    pub q: Option<String>,
}

/// `GET /search?q=`: model-suggested slugs.
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default().to_string();
    let count = page_count(&state).await;
    if query.is_empty() {
        return Html(render::search_page("", &[], None, count)).into_response();
    }

    match state.service.search(&query, DEFAULT_SEARCH_LIMIT).await {
        Ok(results) => {
            let slugs: Vec<String> = results.into_iter().map(|hit| hit.slug).collect();
            Html(render::search_page(&query, &slugs, None, count)).into_response()
        },
        Err(err) if err.is_client_fault() => {
            let (status, message) = status_for(&err);
            warn!(query, error = %err, "search rejected");
            (status, Html(render::search_page(&query, &[], Some(message), count))).into_response()
        },
        Err(err) => error_response(&state, "search request failed", &err).await,
    }
}

/// `GET /healthz`: liveness plus store reachability.
pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.service.page_count().await {
        Ok(pages) => Json(json!({ "status": "ok", "store": "ok", "pages": pages })).into_response(),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "store": "error" })),
            )
                .into_response()
        },
    }
}
