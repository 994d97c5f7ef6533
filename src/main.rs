use crate::config::Config;
use crate::handler::Service;
use crate::service::GameService;
use crate::store::JsonFileStore;
use clap::Parser;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use warp::{
    http::{header, Method},
    Filter, Rejection, Reply,
};

mod config;
mod handler;
mod service;
mod store;

#[derive(Error, Debug)]
enum StartupError {
    #[error("Failed to install the tracing subscriber: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::parse();

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(config.log_level())
        .with_writer(non_blocking)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let service: Service = Arc::new(GameService::open(JsonFileStore::new(&config.data_dir)));
    info!(
        data_dir = %config.data_dir.display(),
        bind = %config.bind,
        "starting connect four server"
    );

    warp::serve(routes(service)).run(config.bind).await;
    Ok(())
}

fn routes(service: Service) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health_route = warp::path!("health")
        .and(warp::get())
        .and_then(handler::health_handler);

    let state_route = warp::path!("state")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handler::state_handler);

    let scores_route = warp::path!("scores")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(handler::scores_handler);

    let new_route = warp::path!("new")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(handler::new_game_handler);

    let resume_route = warp::path!("resume")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(handler::resume_handler);

    let save_route = warp::path!("save")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(handler::save_handler);

    let play_routes = warp::path!("play")
        .and(warp::post())
        .and(warp::body::form())
        .and(with_service(service.clone()))
        .and_then(handler::play_handler)
        .or(warp::path!("play" / i64)
            .and(warp::post())
            .and(with_service(service))
            .and_then(handler::play_column_handler));

    health_route
        .or(state_route)
        .or(scores_route)
        .or(new_route)
        .or(resume_route)
        .or(save_route)
        .or(play_routes)
        .with(
            warp::cors()
                .allow_methods(&[Method::OPTIONS, Method::GET, Method::POST])
                .allow_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
                .max_age(300)
                .allow_any_origin(),
        )
}

fn with_service(service: Service) -> impl Filter<Extract = (Service,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}
