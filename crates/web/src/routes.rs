use std::collections::HashMap;
use std::sync::Arc;

use askama::Template;
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use extract::{
    Analysis, AnalyzeError, DisplayField, DisplayView, Resolution, Session, SubmissionState,
    TaskAnalyzer, Ticket,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Pre-filled into the textarea on first load.
pub const SAMPLE_INPUT: &str =
    "Tôi muốn giao cho ông A làm việc với Hóc Môn và báo cáo lại cho tôi vào ngày 05/07";

/// Identifies one browser so each gets its own submission session.
const CLIENT_COOKIE: &str = "task_analyzer_client";

pub struct AppState {
    pub analyzer: TaskAnalyzer,
    /// Only sessions with an analysis in flight; finished ones are dropped.
    sessions: Mutex<HashMap<String, Session>>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Every session's tickets are children of `shutdown`.
    pub fn new(analyzer: TaskAnalyzer, shutdown: CancellationToken) -> Self {
        Self {
            analyzer,
            sessions: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Resolve the client's pending submission and forget the session.
    /// `None` when the ticket is no longer the pending one.
    async fn finish(
        &self,
        client: &str,
        ticket: &Ticket,
        outcome: Result<Analysis, AnalyzeError>,
    ) -> Option<SubmissionState> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(client)?;
        if session.resolve(ticket, outcome) == Resolution::Stale {
            return None;
        }
        let resolved = session.state().clone();
        sessions.remove(client);
        Some(resolved)
    }

    async fn abandon(&self, client: &str, ticket: &Ticket) {
        let mut sessions = self.sessions.lock().await;
        let cancelled = sessions
            .get_mut(client)
            .is_some_and(|session| session.cancel_ticket(ticket));
        if cancelled {
            sessions.remove(client);
        }
    }
}

fn client_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == CLIENT_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The caller's client id, and whether it was just issued.
fn identify(headers: &HeaderMap) -> (String, bool) {
    match client_id(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    }
}

fn with_client_cookie(mut response: Response, client: &str, fresh: bool) -> Response {
    if !fresh {
        return response;
    }
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", CLIENT_COOKIE, client);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "could not set client cookie"),
    }
    response
}

#[derive(Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    text: String,
}

#[derive(Template)]
#[template(path = "index.html")]
struct PageTemplate {
    text: String,
    pending: bool,
    error: Option<String>,
    result: Option<Vec<GroupView>>,
    raw_payload: Option<String>,
    endpoint: String,
}

struct GroupView {
    title: Option<String>,
    fields: Vec<DisplayField>,
}

fn groups_for(view: &DisplayView) -> Option<Vec<GroupView>> {
    match view {
        DisplayView::None => None,
        DisplayView::Single(fields) => Some(vec![GroupView {
            title: None,
            fields: fields.clone(),
        }]),
        DisplayView::Multi(groups) => Some(
            groups
                .iter()
                .map(|g| GroupView {
                    title: Some(g.title.clone()),
                    fields: g.fields.clone(),
                })
                .collect(),
        ),
    }
}

impl PageTemplate {
    fn from_state(state: &SubmissionState, endpoint: &str) -> Self {
        let mut page = PageTemplate {
            text: state.text().unwrap_or(SAMPLE_INPUT).to_string(),
            pending: false,
            error: None,
            result: None,
            raw_payload: None,
            endpoint: endpoint.to_string(),
        };

        match state {
            SubmissionState::Idle => {}
            SubmissionState::Pending { .. } => page.pending = true,
            SubmissionState::Success { analysis, .. } => {
                page.result = groups_for(&analysis.view);
                page.raw_payload = analysis.raw_payload();
            }
            SubmissionState::Failed { message, .. } => page.error = Some(message.clone()),
        }

        page
    }
}

fn render(page: PageTemplate, status: StatusCode) -> Response {
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {}", e)),
            )
                .into_response()
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(show_page).post(submit))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn show_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (client, fresh) = identify(&headers);
    let endpoint = state.analyzer.endpoint();

    let page = {
        let sessions = state.sessions.lock().await;
        match sessions.get(&client) {
            Some(session) => PageTemplate::from_state(session.state(), endpoint),
            None => PageTemplate::from_state(&SubmissionState::Idle, endpoint),
        }
    };

    with_client_cookie(render(page, StatusCode::OK), &client, fresh)
}

async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<AnalyzeForm>,
) -> Response {
    let (client, fresh) = identify(&headers);
    let response = run_submission(&state, &client, form.text).await;
    with_client_cookie(response, &client, fresh)
}

async fn run_submission(state: &Arc<AppState>, client: &str, text: String) -> Response {
    let endpoint = state.analyzer.endpoint();

    let ticket = {
        let mut sessions = state.sessions.lock().await;
        let session = sessions
            .entry(client.to_string())
            .or_insert_with(|| Session::new(state.shutdown.clone()));
        match session.submit(&text) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::info!(error = %e, "submission rejected");
                let mut page = PageTemplate::from_state(session.state(), endpoint);
                page.text = text;
                page.error = Some(e.to_string());
                return render(page, StatusCode::CONFLICT);
            }
        }
    };

    tracing::info!(seq = ticket.seq(), chars = text.chars().count(), "analysis submitted");

    // Run detached so a dropped connection still resolves the session.
    let worker = {
        let state = state.clone();
        let ticket = ticket.clone();
        let client = client.to_string();
        let text = text.clone();
        tokio::spawn(async move {
            let outcome = state
                .analyzer
                .analyze_text_with_cancel(&text, ticket.cancellation())
                .await;
            if let Err(e) = &outcome {
                tracing::warn!(seq = ticket.seq(), kind = e.kind(), error = %e, "analysis failed");
            }
            state.finish(&client, &ticket, outcome).await
        })
    };

    match worker.await {
        Ok(Some(resolved)) => render(PageTemplate::from_state(&resolved, endpoint), StatusCode::OK),
        Ok(None) => {
            let mut page = PageTemplate::from_state(&SubmissionState::Idle, endpoint);
            page.text = text;
            page.error = Some("yêu cầu phân tích đã bị huỷ".to_string());
            render(page, StatusCode::OK)
        }
        Err(e) => {
            tracing::error!(seq = ticket.seq(), error = %e, "analysis task aborted");
            state.abandon(client, &ticket).await;
            let mut page = PageTemplate::from_state(&SubmissionState::Idle, endpoint);
            page.text = text;
            page.error = Some("lỗi nội bộ khi phân tích".to_string());
            render(page, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
