use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::game::{Directory, Member, Outbound, RoomSession};
use crate::state::app_state::AppState;
use crate::ws::protocol::{Command, Envelope};

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let connection = PlayerConnection::new(Uuid::new_v4(), app_state.directory());
    ws::start(connection, &req, stream)
}

/// One client socket. Decodes commands, forwards them to its room one at a
/// time, and writes room events back out.
pub struct PlayerConnection {
    conn_id: Uuid,
    name: Option<String>,
    directory: Arc<Directory>,
    room: Option<Arc<RoomSession>>,
    alive: bool,
    /// Last successful write to the socket.
    last_sent: Instant,
    /// Last frame of any kind from the client.
    last_heard: Instant,
    keepalive_interval: Duration,
    client_timeout: Duration,
}

impl PlayerConnection {
    pub fn new(conn_id: Uuid, directory: Arc<Directory>) -> Self {
        let rules = directory.rules();
        let keepalive_interval = rules.keepalive_interval;
        let client_timeout = rules.client_timeout;
        Self {
            conn_id,
            name: None,
            directory,
            room: None,
            alive: true,
            last_sent: Instant::now(),
            last_heard: Instant::now(),
            keepalive_interval,
            client_timeout,
        }
    }

    fn send(&mut self, ctx: &mut ws::WebsocketContext<Self>, envelope: &Envelope) {
        if !self.alive {
            return;
        }
        match envelope.to_json() {
            Ok(payload) => {
                ctx.text(payload);
                self.last_sent = Instant::now();
            }
            Err(err) => warn!(conn_id = %self.conn_id, error = %err, "[WS CONN] failed to serialize outbound message"),
        }
    }

    fn schedule_keepalive(&self, ctx: &mut ws::WebsocketContext<Self>, after: Duration) {
        ctx.run_later(after, |act, ctx| act.keepalive_tick(ctx));
    }

    /// Send KEEPALIVE only when nothing else went out for a full interval,
    /// otherwise sleep for whatever is left of it.
    fn keepalive_tick(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.alive {
            return;
        }
        if self.last_heard.elapsed() > self.client_timeout {
            warn!(conn_id = %self.conn_id, player = ?self.name, "[WS CONN] client timed out");
            self.shut_down(ctx, ws::CloseCode::Normal);
            return;
        }

        let quiet_for = self.last_sent.elapsed();
        if quiet_for >= self.keepalive_interval {
            self.send(ctx, &Envelope::keepalive());
            ctx.ping(b"");
            self.schedule_keepalive(ctx, self.keepalive_interval);
        } else {
            self.schedule_keepalive(ctx, self.keepalive_interval - quiet_for);
        }
    }

    fn shut_down(&mut self, ctx: &mut ws::WebsocketContext<Self>, code: ws::CloseCode) {
        ctx.close(Some(ws::CloseReason::from(code)));
        ctx.stop();
    }

    fn on_text(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let command = match text.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                warn!(conn_id = %self.conn_id, error = %err, "[WS CONN] dropping bad message");
                return;
            }
        };

        match command {
            Command::Keepalive => {}
            Command::Connect { player_name } => self.on_connect(player_name),
            Command::Join { table } => self.on_join(table, ctx),
            Command::Leave => self.on_leave(ctx),
            Command::Pass | Command::Skip | Command::Draw { .. } | Command::Guess { .. } => {
                self.on_play(command, ctx)
            }
        }
    }

    fn on_connect(&mut self, player_name: String) {
        if let Some(room) = &self.room {
            warn!(
                conn_id = %self.conn_id,
                room = %room.name(),
                "[WS CONN] CONNECT rejected while in a room"
            );
            return;
        }
        info!(conn_id = %self.conn_id, player = %player_name, "[WS CONN] identified");
        self.name = Some(player_name);
    }

    fn on_join(&mut self, table: String, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(name) = self.name.clone() else {
            warn!(conn_id = %self.conn_id, room = %table, "[WS CONN] JOIN rejected before CONNECT");
            return;
        };
        if self.room.as_ref().is_some_and(|room| room.name() == table) {
            debug!(conn_id = %self.conn_id, room = %table, "[WS CONN] already in room");
            return;
        }

        let conn_id = self.conn_id;
        let previous = self.room.take();
        let directory = self.directory.clone();
        let member = Member::new(conn_id, name, ctx.address().recipient::<Outbound>());
        let target = table.clone();

        ctx.wait(
            async move {
                if let Some(previous) = previous {
                    previous.leave(conn_id).await?;
                }
                directory.join(&target, member).await
            }
            .into_actor(self)
            .map(move |res: Result<Arc<RoomSession>, AppError>, act, _ctx| match res {
                Ok(room) => act.room = Some(room),
                Err(err) => {
                    error!(conn_id = %act.conn_id, room = %table, error = %err, "[WS CONN] join failed");
                    // a partially completed join may still have registered us
                    act.room = act
                        .directory
                        .get(&table)
                        .filter(|room| room.has_connection(act.conn_id));
                }
            }),
        );
    }

    fn on_leave(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(room) = self.room.take() else {
            debug!(conn_id = %self.conn_id, "[WS CONN] LEAVE outside a room");
            return;
        };
        let conn_id = self.conn_id;
        ctx.wait(
            async move { room.leave(conn_id).await }
                .into_actor(self)
                .map(|res, act, _ctx| {
                    if let Err(err) = res {
                        error!(conn_id = %act.conn_id, error = %err, "[WS CONN] leave failed");
                    }
                }),
        );
    }

    fn on_play(&mut self, command: Command, ctx: &mut ws::WebsocketContext<Self>) {
        let (Some(room), Some(name)) = (self.room.clone(), self.name.clone()) else {
            warn!(conn_id = %self.conn_id, ?command, "[WS CONN] command rejected outside a room");
            return;
        };
        ctx.wait(
            async move {
                match command {
                    Command::Pass => room.pass_turn(&name).await,
                    Command::Skip => room.skip_vote(&name).await,
                    Command::Draw { points } => room.draw(&name, points).await,
                    Command::Guess { word } => room.guess(&name, &word).await,
                    _ => Ok(()),
                }
            }
            .into_actor(self)
            .map(|res, act, _ctx| {
                if let Err(err) = res {
                    error!(conn_id = %act.conn_id, player = ?act.name, error = %err, "[WS CONN] command failed");
                }
            }),
        );
    }
}

impl Actor for PlayerConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!(conn_id = %self.conn_id, "[WS CONN] started");
        self.schedule_keepalive(ctx, self.keepalive_interval);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if !self.alive {
            return;
        }
        self.alive = false;
        if let Some(room) = self.room.take() {
            let conn_id = self.conn_id;
            actix::spawn(async move {
                if let Err(err) = room.disconnect(conn_id).await {
                    error!(conn_id = %conn_id, room = %room.name(), error = %err, "[WS CONN] disconnect failed");
                }
            });
        }
        info!(conn_id = %self.conn_id, player = ?self.name, "[WS CONN] stopped");
    }
}

impl Handler<Outbound> for PlayerConnection {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) -> Self::Result {
        self.send(ctx, &msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PlayerConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        self.last_heard = Instant::now();
        match msg {
            Ok(ws::Message::Text(text)) => self.on_text(&text, ctx),
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Binary(_)) => {
                warn!(conn_id = %self.conn_id, "[WS CONN] dropping binary frame");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(conn_id = %self.conn_id, error = %err, "[WS CONN] protocol error");
                self.shut_down(ctx, ws::CloseCode::Error);
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        debug!(conn_id = %self.conn_id, "[WS CONN] client stream ended");
        ctx.stop();
    }
}
