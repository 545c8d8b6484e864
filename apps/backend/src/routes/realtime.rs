use actix_web::web;

use crate::ws::connection::upgrade;

/// `GET /game`: WebSocket upgrade, one player connection per socket.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/game", web::get().to(upgrade));
}
