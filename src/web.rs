use crate::{
    CountBounds, DEFAULT_MAX_REPEAT, FormDecodeError, GenerationCapability, InputModel,
    PatternCompileError, QUERY_ROUTE, RegexGenerator, RouteTable, Suggestion, SuggestionBuilder,
    generate,
};
use askama::Template;
use axum::{
    Json, Router,
    extract::{ConnectInfo, RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Span, debug, error, info, info_span, warn};

type SharedState = Arc<AppState>;
const CORRELATION_ID_LEN: usize = 16;

/// Read-only state shared by every request.
pub struct AppState {
    pub bounds: CountBounds,
    pub analytics_id: Option<String>,
    pub capability: Arc<dyn GenerationCapability>,
    pub suggestions: SuggestionBuilder,
}

impl AppState {
    pub fn new(config: &WebConfig) -> Self {
        let routes = RouteTable::new(config.base_url.clone()).with_route(QUERY_ROUTE, "/");
        Self {
            bounds: config.bounds,
            analytics_id: config.analytics_id.clone(),
            capability: Arc::new(RegexGenerator::new(config.max_repeat)),
            suggestions: SuggestionBuilder::new(Arc::new(routes)),
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
    pub analytics_id: Option<String>,
    pub bounds: CountBounds,
    pub max_repeat: u32,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: String::new(),
            analytics_id: None,
            bounds: CountBounds::default(),
            max_repeat: DEFAULT_MAX_REPEAT,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(&config));
    let router = build_router(state);
    info!(
        %config.addr,
        base = %config.base_url,
        min_count = config.bounds.min(),
        max_count = config.bounds.max(),
        analytics = config.analytics_id.is_some(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ResponseError {
    status: StatusCode,
    message: String,
}

impl ResponseError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(query))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "regexgen-web" }))
}

async fn query(
    State(state): State<SharedState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    RawQuery(query): RawQuery,
) -> Response {
    let peer = peer.map(|ConnectInfo(addr)| addr);
    if wants_json(&headers) {
        json_response(&state, query.as_deref(), peer)
    } else {
        html_response(&state, query.as_deref(), peer)
    }
}

/// True when any `Accept` media range is `application/json`.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|range| range.trim().parse::<mime::Mime>().ok())
        .any(|range| range.essence_str() == mime::APPLICATION_JSON.essence_str())
}

fn json_response(state: &AppState, query: Option<&str>, peer: Option<SocketAddr>) -> Response {
    let mut trace = RequestTrace::start("get.json", peer);
    match run_pipeline(state, query, &mut trace) {
        Outcome::Generated { results, .. } => Json(results).into_response(),
        Outcome::Suggested { .. } => Json(Vec::<String>::new()).into_response(),
        Outcome::ParseFailed { error, .. } => {
            ResponseError::bad_request(error.to_string()).into_response()
        }
        Outcome::DecodeFailed(error) => ResponseError::bad_request(error.to_string()).into_response(),
    }
}

fn html_response(state: &AppState, query: Option<&str>, peer: Option<SocketAddr>) -> Response {
    let mut trace = RequestTrace::start("get.html", peer);
    let outcome = run_pipeline(state, query, &mut trace);
    let status = outcome.status();
    let output = OutputModel::from_outcome(outcome, state);
    let template = IndexTemplate {
        output: &output,
        version: env!("CARGO_PKG_VERSION"),
    };
    match template.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(err) => {
            trace.record_error(&err.to_string());
            error!(parent: &trace.span, error = %err, "failed to render index template");
            ResponseError::internal("error rendering template index.html").into_response()
        }
    }
}

/// Terminal state of one request before formatting.
#[derive(Debug)]
enum Outcome {
    Suggested {
        input: InputModel,
        suggestion: Option<Suggestion>,
    },
    Generated {
        input: InputModel,
        results: Vec<String>,
    },
    ParseFailed {
        input: InputModel,
        error: PatternCompileError,
    },
    DecodeFailed(FormDecodeError),
}

impl Outcome {
    fn status(&self) -> StatusCode {
        match self {
            Outcome::Suggested { .. } | Outcome::Generated { .. } => StatusCode::OK,
            Outcome::ParseFailed { .. } | Outcome::DecodeFailed(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn run_pipeline(state: &AppState, query: Option<&str>, trace: &mut RequestTrace) -> Outcome {
    let span = trace.span.clone();
    let _entered = span.enter();

    let mut input = match InputModel::from_query(query.unwrap_or_default()) {
        Ok(input) => input,
        Err(err) => {
            trace.record_error(&err.to_string());
            return Outcome::DecodeFailed(err);
        }
    };
    let count = state.bounds.sanitize(input.count);
    input.count = i64::try_from(count).unwrap_or(i64::MAX);
    debug!(?input, "decoded request");

    if input.pattern.is_empty() {
        return Outcome::Suggested {
            suggestion: state.suggestions.build(),
            input,
        };
    }

    match generate(
        state.capability.as_ref(),
        &input.pattern,
        input.compile_flags(),
        count,
    ) {
        Ok(results) => Outcome::Generated { input, results },
        Err(error) => {
            trace.record_error(error.message());
            Outcome::ParseFailed { input, error }
        }
    }
}

/// Everything the HTML page shows for one request.
#[derive(Debug, Clone)]
pub struct OutputModel {
    pub input: InputModel,
    pub suggestion: Option<Suggestion>,
    pub min_count: usize,
    pub max_count: usize,
    pub error_message: Option<String>,
    pub results: Vec<String>,
    pub analytics_id: Option<String>,
    pub form_action: String,
}

impl OutputModel {
    fn from_outcome(outcome: Outcome, state: &AppState) -> Self {
        let mut output = Self {
            input: InputModel {
                count: i64::try_from(state.bounds.default_count()).unwrap_or(i64::MAX),
                ..InputModel::default()
            },
            suggestion: None,
            min_count: state.bounds.min(),
            max_count: state.bounds.max(),
            error_message: None,
            results: Vec::new(),
            analytics_id: state.analytics_id.clone(),
            form_action: state
                .suggestions
                .query_route()
                .unwrap_or_else(|| "/".to_string()),
        };
        match outcome {
            Outcome::Suggested { input, suggestion } => {
                output.input = input;
                output.suggestion = suggestion;
            }
            Outcome::Generated { input, results } => {
                output.input = input;
                output.results = results;
            }
            Outcome::ParseFailed { input, error } => {
                output.input = input;
                output.error_message = Some(error.to_string());
            }
            Outcome::DecodeFailed(error) => {
                output.error_message = Some(error.to_string());
            }
        }
        output
    }

    pub fn suggestion_pattern(&self) -> &str {
        self.suggestion
            .as_ref()
            .map(|s| s.pattern.as_str())
            .unwrap_or_default()
    }

    pub fn suggestion_url(&self) -> &str {
        self.suggestion
            .as_ref()
            .map(|s| s.url.as_str())
            .unwrap_or_default()
    }
}

/// Per-request correlation context. Dropping it closes the request.
struct RequestTrace {
    id: String,
    family: &'static str,
    span: Span,
    failed: bool,
}

impl RequestTrace {
    fn start(family: &'static str, peer: Option<SocketAddr>) -> Self {
        let id = correlation_id();
        let host = peer
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());
        let span = info_span!("request", id = %id, family, host = %host);
        info!(parent: &span, "handling {family} request");
        Self {
            id,
            family,
            span,
            failed: false,
        }
    }

    fn record_error(&mut self, message: &str) {
        self.failed = true;
        warn!(parent: &self.span, error = message, "request failed");
    }
}

impl Drop for RequestTrace {
    fn drop(&mut self) {
        info!(
            parent: &self.span,
            id = %self.id,
            family = self.family,
            failed = self.failed,
            "request finished"
        );
    }
}

fn correlation_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CORRELATION_ID_LEN)
        .map(char::from)
        .collect()
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>regexgen • Example strings for regular expressions</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% if output.analytics_id.is_some() %}
    <script async src="https://www.googletagmanager.com/gtag/js?id={{ output.analytics_id.as_ref().unwrap() }}"></script>
    <script>
      window.dataLayer = window.dataLayer || [];
      function gtag(){dataLayer.push(arguments);}
      gtag('js', new Date());
      gtag('config', '{{ output.analytics_id.as_ref().unwrap() }}');
    </script>
    {% endif %}
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-3xl w-full space-y-6">
        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">regexgen v{{ version }}</p>
          <h1 class="text-4xl font-extrabold tracking-tight">Generate strings that match a regular expression.</h1>
        </div>

        <form method="get" action="{{ output.form_action }}" class="bg-white shadow rounded p-4 space-y-4">
          <label class="block">
            <span class="text-sm font-semibold text-slate-600">Pattern</span>
            <input type="text" name="pattern" value="{{ output.input.pattern }}" class="mt-1 w-full rounded border border-slate-300 px-3 py-2 font-mono" autofocus>
          </label>
          <label class="block">
            <span class="text-sm font-semibold text-slate-600">Count ({{ output.min_count }}–{{ output.max_count }})</span>
            <input type="number" name="count" min="{{ output.min_count }}" max="{{ output.max_count }}" value="{{ output.input.count }}" class="mt-1 w-32 rounded border border-slate-300 px-3 py-2">
          </label>
          <fieldset class="grid gap-2 md:grid-cols-3 text-sm">
            <label><input type="checkbox" name="foldCase"{% if output.input.flags.fold_case %} checked{% endif %}> Case-insensitive</label>
            <label><input type="checkbox" name="classNL"{% if output.input.flags.class_nl %} checked{% endif %}> Classes match newline</label>
            <label><input type="checkbox" name="dotNL"{% if output.input.flags.dot_nl %} checked{% endif %}> Dot matches newline</label>
            <label><input type="checkbox" name="oneLine"{% if output.input.flags.one_line %} checked{% endif %}> ^ and $ match text only</label>
            <label><input type="checkbox" name="nonGreedy"{% if output.input.flags.non_greedy %} checked{% endif %}> Non-greedy</label>
            <label><input type="checkbox" name="perlX"{% if output.input.flags.perl_x %} checked{% endif %}> Perl extensions</label>
          </fieldset>
          <button type="submit" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Generate</button>
        </form>

        {% if output.error_message.is_some() %}
        <section id="error" class="rounded border border-red-300 bg-red-50 p-4 text-red-800">
          <p class="font-semibold">Could not generate strings</p>
          <p class="font-mono text-sm">{{ output.error_message.as_ref().unwrap() }}</p>
        </section>
        {% endif %}

        {% if output.suggestion.is_some() %}
        <section id="suggestion" class="text-slate-600">
          <p>Need an example? Try <a href="{{ output.suggestion_url() }}" class="text-blue-700 hover:underline font-mono">{{ output.suggestion_pattern() }}</a></p>
        </section>
        {% endif %}

        {% if output.results.len() > 0 %}
        <section id="results">
          <h2 class="text-xl font-semibold mb-2">Results ({{ output.results.len() }})</h2>
          <ol class="bg-white shadow rounded divide-y divide-slate-200 font-mono">
            {% for result in output.results %}
            <li class="px-4 py-2 whitespace-pre-wrap">{{ result }}</li>
            {% endfor %}
          </ol>
        </section>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct IndexTemplate<'a> {
    output: &'a OutputModel,
    version: &'static str,
}
