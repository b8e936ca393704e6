//! Session Transport
//!
//! The session layer only sees [`TransportEvent`]s and produces [`Outgoing`]
//! messages; how they travel is the transport's business. [`LoopbackHub`]
//! is an in-process transport over tokio channels that still pushes every
//! message through the JSON codec, so peers exchange exactly what a socket
//! would carry.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::game::state::PlayerId;
use crate::network::protocol::{Message, ProtocolError};

/// Something that happened on the session channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A peer connected.
    PeerJoined(PlayerId),
    /// A peer went away.
    PeerLeft(PlayerId),
    /// A decoded message.
    Message {
        /// Sender
        from: PlayerId,
        /// Payload
        message: Message,
    },
    /// The channel itself is gone.
    Closed,
}

/// A message queued by the session layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Deliver to one peer.
    To(PlayerId, Message),
    /// Deliver to every peer except the sender.
    Broadcast(Message),
}

impl Outgoing {
    /// The message being sent.
    pub fn message(&self) -> &Message {
        match self {
            Outgoing::To(_, message) | Outgoing::Broadcast(message) => message,
        }
    }
}

/// Decode one text frame. Malformed frames are logged and dropped.
pub fn decode_frame(from: PlayerId, text: &str) -> Option<TransportEvent> {
    match Message::from_json(text) {
        Ok(message) => Some(TransportEvent::Message { from, message }),
        Err(e) => {
            debug!(from = %from.short(), error = %e, "Dropping malformed frame");
            None
        }
    }
}

/// Raw frame on a loopback channel.
#[derive(Debug, Clone)]
enum Frame {
    Joined(PlayerId),
    Left(PlayerId),
    Text { from: PlayerId, text: String },
    Closed,
}

type PeerTable = Arc<RwLock<BTreeMap<PlayerId, mpsc::UnboundedSender<Frame>>>>;

// =============================================================================
// LOOPBACK HUB
// =============================================================================

/// In-process transport connecting any number of peers.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    peers: PeerTable,
}

impl LoopbackHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a peer. Peers already connected see `PeerJoined`.
    pub async fn connect(&self, id: PlayerId) -> PeerLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut peers = self.peers.write().await;
        for (other, sender) in peers.iter() {
            if *other != id {
                let _ = sender.send(Frame::Joined(id));
            }
        }
        peers.insert(id, tx);
        debug!(peer = %id.short(), peers = peers.len(), "Peer connected");

        PeerLink { id, peers: self.peers.clone(), rx, connected: true }
    }

    /// Close the channel for everyone.
    pub async fn shutdown(&self) {
        let mut peers = self.peers.write().await;
        for sender in peers.values() {
            let _ = sender.send(Frame::Closed);
        }
        peers.clear();
        info!("Loopback hub shut down");
    }

    /// Push a raw text frame to `to` as if `from` had sent it.
    pub async fn inject_raw(&self, from: PlayerId, to: PlayerId, text: impl Into<String>) -> bool {
        let peers = self.peers.read().await;
        match peers.get(&to) {
            Some(sender) => sender.send(Frame::Text { from, text: text.into() }).is_ok(),
            None => false,
        }
    }

    /// Connected peer count.
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

/// One peer's end of a [`LoopbackHub`].
pub struct PeerLink {
    id: PlayerId,
    peers: PeerTable,
    rx: mpsc::UnboundedReceiver<Frame>,
    connected: bool,
}

impl PeerLink {
    /// This peer's id.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Encode and send one message. Unknown targets are ignored.
    pub async fn send(&self, outgoing: Outgoing) -> Result<(), ProtocolError> {
        let text = outgoing.message().to_json()?;
        let peers = self.peers.read().await;
        match outgoing {
            Outgoing::To(target, message) => match peers.get(&target) {
                Some(sender) => {
                    let _ = sender.send(Frame::Text { from: self.id, text });
                }
                None => debug!(to = %target.short(), kind = message.kind(), "Target not connected"),
            },
            Outgoing::Broadcast(_) => {
                for (peer, sender) in peers.iter() {
                    if *peer != self.id {
                        let _ = sender.send(Frame::Text { from: self.id, text: text.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    /// Send a batch in order.
    pub async fn send_all(&self, batch: Vec<Outgoing>) -> Result<(), ProtocolError> {
        for outgoing in batch {
            self.send(outgoing).await?;
        }
        Ok(())
    }

    /// Wait for the next event. `None` once the link is closed and drained.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            let frame = self.rx.recv().await?;
            if let Some(event) = self.decode(frame) {
                return Some(event);
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        while let Ok(frame) = self.rx.try_recv() {
            if let Some(event) = self.decode(frame) {
                return Some(event);
            }
        }
        None
    }

    fn decode(&self, frame: Frame) -> Option<TransportEvent> {
        match frame {
            Frame::Joined(id) => Some(TransportEvent::PeerJoined(id)),
            Frame::Left(id) => Some(TransportEvent::PeerLeft(id)),
            Frame::Text { from, text } => decode_frame(from, &text),
            Frame::Closed => Some(TransportEvent::Closed),
        }
    }

    /// Detach from the hub. Remaining peers see `PeerLeft`. Safe to call twice.
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let mut peers = self.peers.write().await;
        peers.remove(&self.id);
        for sender in peers.values() {
            let _ = sender.send(Frame::Left(self.id));
        }
        debug!(peer = %self.id.short(), "Peer disconnected");
    }
}

// =============================================================================
// TESTS
// =============================================================================
