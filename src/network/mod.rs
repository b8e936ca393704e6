//! Network Layer
//!
//! Message schema, snapshots, lobby roster and the host/client session.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod snapshot;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use protocol::{
    CountdownPayload, EndPayload, ErrorCode, ErrorPayload, HelloPayload, InputPayload,
    Message, ProtocolError, ReadyPayload, RosterPayload, RosterPlayer, ScoreLine, StartPayload,
};
pub use snapshot::{PlayerSnapshot, Snapshot, SnapshotDecoder, SnapshotError};
pub use roster::{Roster, RosterEntry};
pub use scheduler::{Advance, FixedStepScheduler, FrameClock, SendThrottle};
pub use session::{Role, Session, SessionConfig, SessionError};
pub use transport::{decode_frame, LoopbackHub, Outgoing, PeerLink, TransportEvent};
