use std::sync::Arc;

use warp::Filter;

use super::websocket;
use crate::quiz::QuizServer;

/// WebSocket route for quiz rooms. The room id is a path segment so one
/// connection is bound to one room for its whole lifetime.
pub fn room_websocket_route(
    server: Arc<QuizServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("room" / String)
        .and(warp::ws())
        .and(with_server(server))
        .map(|room_id: String, ws: warp::ws::Ws, server: Arc<QuizServer>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_connection(websocket, room_id, server)
            })
        })
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Quiz Room Server",
                "version": "1.0.0"
            }))
        })
}

fn with_server(
    server: Arc<QuizServer>,
) -> impl Filter<Extract = (Arc<QuizServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}
