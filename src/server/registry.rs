//! Connection registry actor.
//!
//! Maps each participant to at most one live channel. The registry is the only
//! owner of channel handles; everything else reaches participants through it.
//! Registering again replaces the previous channel (last registration wins), and
//! the replaced channel is told so and closes itself.

use actix::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use log::{debug, info};

use crate::error::EngineError;
use crate::race::types::ParticipantId;
use crate::server::messages::ServerWsMessage;

pub type ConnectionId = u64;

/// Whether a message reached a live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, MessageResponse)]
pub enum Delivery {
    Delivered,
    NotDelivered,
}

/// Fold a `Broadcast` reply: anyone left unreached is a `DeliveryFailed`.
pub fn delivered_to_all(unreached: &[ParticipantId]) -> Result<(), EngineError> {
    if unreached.is_empty() {
        Ok(())
    } else {
        Err(EngineError::DeliveryFailed)
    }
}

/// Channel lifecycle notifications, consumed by the disconnect supervisor.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
#[rtype(result = "()")]
pub enum ConnectionEvent {
    Opened(ParticipantId),
    Closed(ParticipantId),
}

struct Connection {
    id: ConnectionId,
    recipient: Recipient<ServerWsMessage>,
    last_seen: Instant,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ParticipantId, Connection>,
    next_id: ConnectionId,
    listeners: Vec<Recipient<ConnectionEvent>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, event: ConnectionEvent) {
        for listener in &self.listeners {
            listener.do_send(event.clone());
        }
    }

    fn deliver(&mut self, participant: &ParticipantId, message: ServerWsMessage) -> Delivery {
        match self.connections.get(participant) {
            Some(conn) if conn.recipient.connected() => {
                conn.recipient.do_send(message);
                Delivery::Delivered
            }
            Some(_) => {
                // The channel died without unregistering; treat it as a disconnect.
                self.connections.remove(participant);
                debug!("[Registry] Dropped dead channel of {}", participant);
                self.notify(ConnectionEvent::Closed(participant.clone()));
                Delivery::NotDelivered
            }
            None => {
                debug!("[Registry] {} is not connected, message not delivered", participant);
                Delivery::NotDelivered
            }
        }
    }
}

impl Actor for ConnectionRegistry {
    type Context = Context<Self>;
}

/// Message: bind a live channel to a participant.
#[derive(Message)]
#[rtype(result = "ConnectionId")]
pub struct Register {
    pub participant: ParticipantId,
    pub recipient: Recipient<ServerWsMessage>,
}

/// Message: drop a channel. Ignored if `connection` was already replaced.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Unregister {
    pub participant: ParticipantId,
    pub connection: ConnectionId,
}

/// Message: push to one participant.
#[derive(Message)]
#[rtype(result = "Delivery")]
pub struct Deliver {
    pub participant: ParticipantId,
    pub message: ServerWsMessage,
}

/// Message: push to several participants. Replies with those not reached.
#[derive(Message)]
#[rtype(result = "Vec<ParticipantId>")]
pub struct Broadcast {
    pub participants: Vec<ParticipantId>,
    pub message: ServerWsMessage,
}

/// Message: traffic seen on a channel.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Heartbeat {
    pub participant: ParticipantId,
    pub connection: ConnectionId,
}

/// Message: unregister every channel silent for longer than `idle_for`.
#[derive(Message)]
#[rtype(result = "Vec<ParticipantId>")]
pub struct ReapIdle {
    pub idle_for: Duration,
}

/// Message: receive `ConnectionEvent`s from now on.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe(pub Recipient<ConnectionEvent>);

impl Handler<Register> for ConnectionRegistry {
    type Result = ConnectionId;

    fn handle(&mut self, msg: Register, _ctx: &mut Self::Context) -> Self::Result {
        self.next_id += 1;
        let id = self.next_id;
        let previous = self.connections.insert(
            msg.participant.clone(),
            Connection {
                id,
                recipient: msg.recipient,
                last_seen: Instant::now(),
            },
        );
        if let Some(old) = previous {
            // Kick the old channel; its own Unregister will no longer match.
            old.recipient.do_send(ServerWsMessage::SessionReplaced);
            info!("[Registry] {} reconnected, channel {} replaced by {}", msg.participant, old.id, id);
        } else {
            debug!("[Registry] {} registered on channel {}", msg.participant, id);
        }
        self.notify(ConnectionEvent::Opened(msg.participant));
        id
    }
}

impl Handler<Unregister> for ConnectionRegistry {
    type Result = bool;

    fn handle(&mut self, msg: Unregister, _ctx: &mut Self::Context) -> Self::Result {
        match self.connections.get(&msg.participant) {
            Some(conn) if conn.id == msg.connection => {
                self.connections.remove(&msg.participant);
                debug!("[Registry] {} unregistered channel {}", msg.participant, msg.connection);
                self.notify(ConnectionEvent::Closed(msg.participant));
                true
            }
            _ => false,
        }
    }
}

impl Handler<Deliver> for ConnectionRegistry {
    type Result = Delivery;

    fn handle(&mut self, msg: Deliver, _ctx: &mut Self::Context) -> Self::Result {
        self.deliver(&msg.participant, msg.message)
    }
}

impl Handler<Broadcast> for ConnectionRegistry {
    type Result = Vec<ParticipantId>;

    fn handle(&mut self, msg: Broadcast, _ctx: &mut Self::Context) -> Self::Result {
        msg.participants
            .into_iter()
            .filter(|p| self.deliver(p, msg.message.clone()) == Delivery::NotDelivered)
            .collect()
    }
}

impl Handler<Heartbeat> for ConnectionRegistry {
    type Result = ();

    fn handle(&mut self, msg: Heartbeat, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(conn) = self.connections.get_mut(&msg.participant) {
            if conn.id == msg.connection {
                conn.last_seen = Instant::now();
            }
        }
    }
}

impl Handler<ReapIdle> for ConnectionRegistry {
    type Result = Vec<ParticipantId>;

    fn handle(&mut self, msg: ReapIdle, _ctx: &mut Self::Context) -> Self::Result {
        let now = Instant::now();
        let idle: Vec<ParticipantId> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.saturating_duration_since(conn.last_seen) > msg.idle_for)
            .map(|(id, _)| id.clone())
            .collect();
        for participant in &idle {
            if let Some(conn) = self.connections.remove(participant) {
                conn.recipient.do_send(ServerWsMessage::IdleTimeout);
                info!("[Registry] Reaped idle channel {} of {}", conn.id, participant);
                self.notify(ConnectionEvent::Closed(participant.clone()));
            }
        }
        idle
    }
}

impl Handler<Subscribe> for ConnectionRegistry {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        self.listeners.push(msg.0);
    }
}
