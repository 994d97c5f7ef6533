use crate::service::{GameService, SharedService};
use crate::store::JsonFileStore;
use common::messages::View;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warp::{http::StatusCode, reply::json, Rejection, Reply};

type Result<T> = std::result::Result<T, Rejection>;

pub type Service = SharedService<JsonFileStore>;

#[derive(Deserialize, Debug)]
pub struct PlayForm {
    col: String,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    error: String,
    view: View,
}

#[derive(Debug)]
pub struct TaskFailed;

impl warp::reject::Reject for TaskFailed {}

// Service calls block on the mutex and on file I/O, so keep them off the reactor
async fn run<T, F>(service: Service, f: F) -> Result<T>
where
    F: FnOnce(&GameService<JsonFileStore>) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|err| {
            warn!("service task failed: {}", err);
            warp::reject::custom(TaskFailed)
        })
}

pub async fn state_handler(service: Service) -> Result<impl Reply> {
    let view = run(service, |s| s.view_and_clear_message()).await?;
    Ok(json(&view))
}

pub async fn scores_handler(service: Service) -> Result<impl Reply> {
    let scores = run(service, |s| s.scores()).await?;
    Ok(json(&scores))
}

pub async fn new_game_handler(service: Service) -> Result<impl Reply> {
    // A leftover save file is already logged by the service
    let view = run(service, |s| s.new_game().unwrap_or_else(|_| s.view())).await?;
    Ok(json(&view))
}

pub async fn resume_handler(service: Service) -> Result<impl Reply> {
    let report = run(service, |s| s.resume()).await?;
    Ok(json(&report))
}

pub async fn save_handler(service: Service) -> Result<impl Reply> {
    let reply = run(service, |s| match s.save() {
        Ok(view) => warp::reply::with_status(json(&view), StatusCode::OK),
        Err(err) => warp::reply::with_status(
            json(&ErrorResponse {
                error: err.to_string(),
                view: s.view(),
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
    })
    .await?;
    Ok(reply)
}

pub async fn play_handler(form: PlayForm, service: Service) -> Result<impl Reply> {
    info!("play requested for column {:?}", form.col);
    let report = run(service, move |s| s.play_input(&form.col)).await?;
    Ok(json(&report))
}

pub async fn play_column_handler(col: i64, service: Service) -> Result<impl Reply> {
    let report = run(service, move |s| s.play(col)).await?;
    Ok(json(&report))
}

pub async fn health_handler() -> Result<impl Reply> {
    Ok(StatusCode::OK)
}
