//! HTTP and WebSocket routing configuration.

use actix_web::web;

use crate::server::api;
use crate::server::session::ws_race;

/// Configure the application's HTTP/WebSocket routes.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/race").to(ws_race))
        .service(
            web::scope("/api")
                .route("/queue/join", web::post().to(api::join_queue))
                .route("/queue/leave", web::post().to(api::leave_queue))
                .route("/queue/status", web::get().to(api::queue_status))
                .route("/matches/{match_id}", web::get().to(api::get_match))
                .route("/leaderboard", web::get().to(api::leaderboard)),
        );
}
