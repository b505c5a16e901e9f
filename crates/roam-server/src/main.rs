use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use roam_api::auth::{self, AppState, AppStateInner};
use roam_api::middleware::require_auth;
use roam_api::{attendance, chat, requests, trips};
use roam_gateway::connection;
use roam_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roam=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ROAM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("ROAM_DB_PATH").unwrap_or_else(|_| "roam.db".into());
    let host = std::env::var("ROAM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ROAM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = roam_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
    });

    let ws_state = ServerState {
        dispatcher,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/trips", post(trips::create_trip))
        .route("/trips/mine", get(trips::my_trips))
        .route("/trips/{trip_id}", get(trips::get_trip))
        .route("/trips/{trip_id}", delete(trips::delete_trip))
        .route("/trips/{trip_id}/status", post(trips::update_trip_status))
        .route("/trips/{trip_id}/requests", post(requests::submit_request))
        .route("/trips/{trip_id}/requests", get(requests::pending_requests))
        .route("/trips/{trip_id}/attendance", get(attendance::roster))
        .route("/trips/{trip_id}/attendance", post(attendance::mark_attendance))
        .route("/requests/mine", get(requests::my_requests))
        .route("/requests/incoming", get(requests::incoming_requests))
        .route("/requests/{request_id}/accept", post(requests::accept_request))
        .route("/requests/{request_id}/reject", post(requests::reject_request))
        .route("/chat/rooms", get(chat::my_rooms))
        .route("/chat/rooms/{room_id}/deactivate", post(chat::deactivate_room))
        .route("/chat/rooms/{room_id}/messages", get(chat::get_messages))
        .route("/chat/rooms/{room_id}/messages", post(chat::send_message))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ws_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Roam server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
