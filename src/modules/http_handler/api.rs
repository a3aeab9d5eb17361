//! REST endpoints for room management.

use super::request::Request;
use super::response::Response;
use super::router::Router;
use crate::config::LimitsConfig;
use crate::rooms::RoomManager;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CreateRoomBody {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    host_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct RoomCreated<'a> {
    room_id: &'a str,
    post_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RoomStopped<'a> {
    status: &'static str,
    room_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

/// Build the router serving the room management API.
///
/// | Method | Path                   |
/// |--------|------------------------|
/// | POST   | `/room/create`         |
/// | POST   | `/room/:room_id/stop`  |
/// | GET    | `/room/:room_id/stats` |
/// | GET    | `/stats`               |
/// | GET    | `/health`              |
#[must_use]
pub fn build_router(rooms: Arc<dyn RoomManager>, limits: &LimitsConfig) -> Router {
    let max_field_length = limits.max_field_length;

    let create = Arc::clone(&rooms);
    let stop = Arc::clone(&rooms);
    let room_stats = Arc::clone(&rooms);
    let stats = rooms;

    Router::new()
        .route(Method::POST, "/room/create", move |req: &Request| {
            create_room(create.as_ref(), req, max_field_length)
        })
        .route(Method::POST, "/room/:room_id/stop", move |req: &Request| {
            stop_room(stop.as_ref(), req)
        })
        .route(Method::GET, "/room/:room_id/stats", move |req: &Request| {
            get_room_stats(room_stats.as_ref(), req)
        })
        .route(Method::GET, "/stats", move |_: &Request| {
            Response::json(StatusCode::OK, &stats.stats())
        })
        .route(Method::GET, "/health", |_: &Request| {
            Response::json(
                StatusCode::OK,
                &Health {
                    status: "healthy",
                    service: "media_server",
                },
            )
        })
}

fn create_room(rooms: &dyn RoomManager, req: &Request, max_field_length: usize) -> Response {
    let body: CreateRoomBody = match serde_json::from_slice(req.body()) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Malformed room creation body");
            CreateRoomBody {
                post_id: None,
                host_user_id: None,
            }
        },
    };

    if let Some(post_id) = &body.post_id {
        if post_id.len() > max_field_length {
            return Response::error(StatusCode::BAD_REQUEST, "post_id too long");
        }
    }
    if let Some(host_user_id) = &body.host_user_id {
        if host_user_id.len() > max_field_length {
            return Response::error(StatusCode::BAD_REQUEST, "host_user_id too long");
        }
    }

    let (post_id, host_user_id) = match (body.post_id, body.host_user_id) {
        (Some(p), Some(h)) if !p.is_empty() && !h.is_empty() => (p, h),
        _ => {
            return Response::error(
                StatusCode::BAD_REQUEST,
                "Missing post_id or host_user_id",
            )
        },
    };

    let Some(room_id) = rooms.create_room(&post_id, &host_user_id) else {
        warn!(post_id = %post_id, "Room manager refused to create room");
        return Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create room");
    };

    info!(room_id = %room_id, post_id = %post_id, "Room created via API");
    Response::json(
        StatusCode::CREATED,
        &RoomCreated {
            room_id: &room_id,
            post_id: &post_id,
        },
    )
}

fn stop_room(rooms: &dyn RoomManager, req: &Request) -> Response {
    let Some(room_id) = req.param("room_id") else {
        return Response::error(StatusCode::BAD_REQUEST, "Missing room_id parameter");
    };

    if !rooms.delete_room(room_id) {
        return Response::error(StatusCode::NOT_FOUND, "Room not found");
    }

    info!(room_id = %room_id, "Room stopped");
    Response::json(
        StatusCode::OK,
        &RoomStopped {
            status: "stopped",
            room_id,
        },
    )
}

fn get_room_stats(rooms: &dyn RoomManager, req: &Request) -> Response {
    let Some(room_id) = req.param("room_id") else {
        return Response::error(StatusCode::BAD_REQUEST, "Missing room_id parameter");
    };

    match rooms.get_room(room_id) {
        Some(snapshot) => Response::json(StatusCode::OK, &snapshot),
        None => Response::error(StatusCode::NOT_FOUND, "Room not found"),
    }
}
