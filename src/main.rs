mod api;
mod config;
mod error;
mod quiz;

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use warp::Filter;

use config::Config;
use quiz::questions::QuestionCatalog;
use quiz::QuizServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("quiz_room_server=info")),
        )
        .init();

    let config = Config::from_env();
    let server = QuizServer::new(config.timing.clone(), QuestionCatalog::default());

    spawn_room_stats_logger(server.clone());

    let routes = api::routes::room_websocket_route(server)
        .or(api::routes::health_check());

    let addr = config.bind_address();
    tracing::info!(port = addr.1, "Quiz room server listening");

    warp::serve(routes).run(addr).await;
}

/// Periodically log how many rooms are live and what phase each is in
fn spawn_room_stats_logger(server: std::sync::Arc<QuizServer>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await; // skip the immediate first tick
        loop {
            interval.tick().await;
            let stats = server.registry().stats().await;
            tracing::info!(active_rooms = stats.len(), "Room stats");
            for (room_id, players, phase) in stats {
                tracing::info!(
                    room_id = %room_id,
                    players = players,
                    phase = ?phase,
                    "Room status"
                );
            }
        }
    });
}
