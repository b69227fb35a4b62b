use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::spawn_blocking;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::cli::ServeOpts;
use crate::golduino::{Golduino, GolduinoError};
use crate::port::open_port;
use crate::proto::command::{Point, Rgb};

/// Where the web UI lives.
const ROUTE: &str = "/golduino";

pub type Sink = Box<dyn Write + Send>;

#[derive(Clone)]
pub struct AppState {
    // One lock per request: mode checks and writes must not interleave.
    golduino: Arc<Mutex<Golduino<Sink>>>,
    root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(golduino: Golduino<Sink>, root: PathBuf) -> Self {
        Self {
            golduino: Arc::new(Mutex::new(golduino)),
            root: Arc::new(root),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Device(#[from] GolduinoError),
    #[error("missing query parameter: {0}")]
    MissingParam(&'static str),
    #[error("invalid integer for {0}: {1}")]
    BadInt(&'static str, String),
    #[error("device worker: {0}")]
    Worker(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Device(GolduinoError::Io(e)) => {
                error!("serial write failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Worker(e) => {
                error!("device worker failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn run(opts: ServeOpts) -> Result<()> {
    let port = open_port(&opts.ser)?;
    info!(dev = %opts.ser.dev, baud = opts.ser.baud, "serial port open");

    let golduino = Golduino::new(Box::new(port) as Sink)
        .with_reset_policy(opts.reset_mode)
        .with_validation(opts.validation);
    let app = router(AppState::new(golduino, opts.root.clone()));

    let listener = tokio::net::TcpListener::bind(opts.bind)
        .await
        .with_context(|| format!("bind {}", opts.bind))?;
    info!(
        root = %opts.root.display(),
        reset_mode = ?opts.reset_mode,
        validation = ?opts.validation,
        "listening on http://{}{}",
        opts.bind,
        ROUTE
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;
    // The router, and with it the port, is gone once serve returns.
    info!("serial port closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ROUTE, get(home))
        .route("/golduino/reset", get(reset))
        .route("/golduino/step", get(step))
        .route("/golduino/continue", get(continue_running))
        .route("/golduino/:file", get(html_file))
        .route("/_interval", get(interval))
        .route("/_seed", get(seed))
        .route("/_color", get(color))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Redirect {
    Redirect::to("/golduino/index.html")
}

async fn html_file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    if !file.ends_with(".html") || file.starts_with('.') || file.contains(['/', '\\']) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read(state.root.join(&file)).await {
        Ok(body) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response(),
        Err(e) => {
            debug!("{}: {}", file, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Run `f` against the board on the blocking pool. Serial writes block, and the
/// lock is held for all of `f` so mode checks and writes form one section.
async fn with_device<F>(state: &AppState, f: F) -> Result<(), ApiError>
where
    F: FnOnce(&mut Golduino<Sink>) -> Result<(), GolduinoError> + Send + 'static,
{
    let golduino = state.golduino.clone();
    spawn_blocking(move || {
        let mut g = golduino
            .lock()
            .map_err(|e| ApiError::Worker(e.to_string()))?;
        f(&mut g)?;
        debug!(mode = ?g.mode(), "done");
        Ok(())
    })
    .await
    .map_err(|e| ApiError::Worker(e.to_string()))?
}

async fn reset(State(state): State<AppState>) -> Result<Html<&'static str>, ApiError> {
    with_device(&state, |g| g.reset()).await?;
    Ok(Html("<h3>Reset!</h3>"))
}

async fn step(State(state): State<AppState>) -> Result<Html<&'static str>, ApiError> {
    with_device(&state, |g| g.step()).await?;
    Ok(Html("<h3>Step!</h3>"))
}

async fn continue_running(State(state): State<AppState>) -> Result<Html<&'static str>, ApiError> {
    with_device(&state, |g| g.run_continuous()).await?;
    Ok(Html("<h3>Continue!</h3>"))
}

#[derive(Deserialize)]
struct IntervalQuery {
    interval: i64,
}

async fn interval(
    State(state): State<AppState>,
    Query(query): Query<IntervalQuery>,
) -> Result<(), ApiError> {
    with_device(&state, move |g| {
        g.enter_configure()?;
        g.configure_iteration_interval(query.interval)?;
        g.run_continuous()
    })
    .await
}

#[derive(Deserialize)]
struct SeedQuery {
    seed: String,
    /// Input_Seed cells as "x,y,x,y,..."
    points: Option<String>,
}

fn parse_points(raw: &str) -> Result<Vec<Point>, ApiError> {
    let nums = raw
        .split(',')
        .map(|v| int_param("points", Some(v)))
        .collect::<Result<Vec<_>, _>>()?;
    if nums.len() % 2 != 0 {
        return Err(ApiError::BadInt("points", raw.to_string()));
    }
    Ok(nums
        .chunks_exact(2)
        .map(|xy| Point { x: xy[0], y: xy[1] })
        .collect())
}

async fn seed(
    State(state): State<AppState>,
    Query(query): Query<SeedQuery>,
) -> Result<(), ApiError> {
    let points = match query.points.as_deref() {
        Some(raw) if !raw.is_empty() => parse_points(raw)?,
        _ => Vec::new(),
    };
    with_device(&state, move |g| {
        g.enter_configure()?;
        g.configure_seed(&query.seed, &points)?;
        g.step()
    })
    .await
}

// red/green/blue stay strings: they are only read for Input_Color.
#[derive(Deserialize)]
struct ColorQuery {
    choice: String,
    red: Option<String>,
    green: Option<String>,
    blue: Option<String>,
}

impl ColorQuery {
    fn rgb(&self) -> Result<Option<Rgb>, ApiError> {
        if self.choice != "Input_Color" {
            return Ok(None);
        }
        Ok(Some(Rgb {
            r: int_param("red", self.red.as_deref())?,
            g: int_param("green", self.green.as_deref())?,
            b: int_param("blue", self.blue.as_deref())?,
        }))
    }
}

fn int_param(name: &'static str, value: Option<&str>) -> Result<i64, ApiError> {
    let v = value.ok_or(ApiError::MissingParam(name))?;
    v.trim()
        .parse()
        .map_err(|_| ApiError::BadInt(name, v.to_string()))
}

async fn color(
    State(state): State<AppState>,
    Query(query): Query<ColorQuery>,
) -> Result<(), ApiError> {
    let rgb = query.rgb()?;
    with_device(&state, move |g| {
        g.enter_configure()?;
        g.configure_color(&query.choice, rgb)?;
        g.run_continuous()
    })
    .await
}
