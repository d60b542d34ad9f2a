//! WebSocket session of one participant.
//!
//! Registers the channel with the connection registry, forwards client messages to
//! the matchmaking server in arrival order and writes server pushes to the socket.
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::Duration;
use log::{debug, warn};

use crate::config::race::PING_INTERVAL_SECS;
use crate::error::EngineError;
use crate::race::types::PlayerInfo;
use crate::server::anti_spam::AntiSpamState;
use crate::server::http_error::identity_error;
use crate::server::identity::resolve_or_guest;
use crate::server::matchmaking::messages::{
    AcceptMatch, DeclineMatch, GetQueueStatus, JoinQueue, LeaveQueue, SubmitMove,
};
use crate::server::matchmaking::MatchmakingServer;
use crate::server::messages::{ClientWsMessage, ServerWsMessage};
use crate::server::registry::{ConnectionId, ConnectionRegistry, Heartbeat, Register, Unregister};

pub struct PlayerSession {
    pub player: PlayerInfo,
    pub connection: Option<ConnectionId>,
    pub registry: Addr<ConnectionRegistry>,
    pub matchmaking: Addr<MatchmakingServer>,
    pub anti_spam: AntiSpamState,
}

impl PlayerSession {
    pub fn new(player: PlayerInfo, registry: Addr<ConnectionRegistry>, matchmaking: Addr<MatchmakingServer>) -> Self {
        Self {
            player,
            connection: None,
            registry,
            matchmaking,
            anti_spam: AntiSpamState::new(),
        }
    }

    fn heartbeat(&self) {
        if let Some(connection) = self.connection {
            self.registry.do_send(Heartbeat {
                participant: self.player.id.clone(),
                connection,
            });
        }
    }

    /// Serialise and write one frame, applying duplicate-error suppression.
    fn push(&mut self, msg: ServerWsMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let who = self.player.id.to_string();
        match &msg {
            ServerWsMessage::Error { code, .. } => {
                if !self.anti_spam.should_send_error(code, &who) {
                    return;
                }
            }
            _ => self.anti_spam.reset_error_suppression(),
        }
        match serde_json::to_string(&msg) {
            Ok(text) => ctx.text(text),
            Err(e) => {
                warn!("[Session] Failed to serialize frame for {}: {}", who, e);
                return;
            }
        }
        if msg.closes_channel() {
            debug!("[Session] Closing channel of {} after {:?}", who, msg);
            ctx.close(Some(ws::CloseReason {
                code: ws::CloseCode::Policy,
                description: None,
            }));
            ctx.stop();
        }
    }

    fn push_error(&mut self, code: &str, message: String, ctx: &mut ws::WebsocketContext<Self>) {
        self.push(
            ServerWsMessage::Error {
                code: code.to_string(),
                message,
            },
            ctx,
        );
    }

    fn send_ban_and_close(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let remaining = self.anti_spam.ban_remaining_secs();
        self.push_error(
            "BANNED",
            format!("Too many messages. Try again in {}s.", remaining),
            ctx,
        );
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some("Banned for spam".into()),
        }));
        ctx.stop();
    }

    /// Await a request/response call to the matchmaking server and surface its error, if any.
    fn call<M>(&mut self, msg: M, ctx: &mut ws::WebsocketContext<Self>)
    where
        M: Message<Result = Result<(), EngineError>> + Send + 'static,
        MatchmakingServer: Handler<M>,
    {
        self.matchmaking
            .send(msg)
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => act.push(ServerWsMessage::error(&e), ctx),
                    Err(e) => act.push_error("INTERNAL", format!("matchmaking unavailable: {e}"), ctx),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn dispatch(&mut self, msg: ClientWsMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let participant = self.player.id.clone();
        match msg {
            ClientWsMessage::JoinQueue { hint } => {
                // Standing is pushed by the server; only failures come back here.
                self.matchmaking
                    .send(JoinQueue { player: self.player.clone(), hint })
                    .into_actor(self)
                    .then(|res, act, ctx| {
                        match res {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => act.push(ServerWsMessage::error(&e), ctx),
                            Err(e) => act.push_error("INTERNAL", format!("matchmaking unavailable: {e}"), ctx),
                        }
                        fut::ready(())
                    })
                    .wait(ctx);
            }
            ClientWsMessage::LeaveQueue => self.matchmaking.do_send(LeaveQueue { participant }),
            ClientWsMessage::QueueStatus => {
                self.matchmaking
                    .send(GetQueueStatus { participant })
                    .into_actor(self)
                    .then(|res, act, ctx| {
                        if let Ok(view) = res {
                            act.push(ServerWsMessage::QueueStatus(view), ctx);
                        }
                        fut::ready(())
                    })
                    .wait(ctx);
            }
            ClientWsMessage::AcceptMatch => self.call(AcceptMatch { participant }, ctx),
            ClientWsMessage::DeclineMatch => self.call(DeclineMatch { participant }, ctx),
            ClientWsMessage::SubmitMove { match_id, command } => {
                self.matchmaking.do_send(SubmitMove {
                    participant,
                    match_id,
                    mv: command,
                });
            }
            ClientWsMessage::Ping => {}
        }
    }
}

impl Actor for PlayerSession {
    type Context = ws::WebsocketContext<Self>;

    /// Registers the channel before any client frame is processed.
    fn started(&mut self, ctx: &mut Self::Context) {
        self.registry
            .send(Register {
                participant: self.player.id.clone(),
                recipient: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(id) => act.connection = Some(id),
                    Err(e) => {
                        warn!("[Session] Registry unavailable for {}: {}", act.player.id, e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);

        ctx.run_interval(Duration::from_secs(PING_INTERVAL_SECS), |_act, ctx| {
            ctx.ping(b"");
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(connection) = self.connection.take() {
            self.registry.do_send(Unregister {
                participant: self.player.id.clone(),
                connection,
            });
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PlayerSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!("[Session] Protocol error from {}: {}", self.player.id, e);
                ctx.stop();
                return;
            }
        };
        self.heartbeat();
        match msg {
            ws::Message::Text(text) => {
                if self.anti_spam.record_request(&self.player.id.to_string()) {
                    self.send_ban_and_close(ctx);
                    return;
                }
                match serde_json::from_str::<ClientWsMessage>(&text) {
                    Ok(client_msg) => self.dispatch(client_msg, ctx),
                    Err(e) => self.push_error("INVALID_MESSAGE", format!("invalid client message: {e}"), ctx),
                }
            }
            ws::Message::Binary(_) => {
                self.push_error("INVALID_MESSAGE", "binary frames are not supported".to_string(), ctx);
            }
            ws::Message::Ping(bytes) => ctx.pong(&bytes),
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Pong(_) | ws::Message::Continuation(_) | ws::Message::Nop => {}
        }
    }
}

impl Handler<ServerWsMessage> for PlayerSession {
    type Result = ();

    fn handle(&mut self, msg: ServerWsMessage, ctx: &mut Self::Context) {
        self.push(msg, ctx);
    }
}

/// Live channel endpoint.
///
/// Query parameters: `player_id` or `guest_id`, optional `name`. Anonymous
/// connections get a fresh guest identity.
pub async fn ws_race(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<crate::server::state::AppState>,
) -> Result<HttpResponse, Error> {
    let player = match resolve_or_guest(req.query_string()) {
        Ok(player) => player,
        Err(e) => return Ok(identity_error(&e)),
    };
    debug!("[Session] {} ({}) connecting", player.id, player.display_name);
    ws::start(
        PlayerSession::new(player, data.registry.clone(), data.matchmaking.clone()),
        &req,
        stream,
    )
}
