//! CasparCG telemetry.
//!
//! An AMCP control connection discovers the playout channels and is kept
//! alive by a heartbeat; the OSC stream pushed by the server feeds the stage
//! state, dropped-frame counters and peak audio levels.

pub mod connection;
pub mod discovery;
pub mod heartbeat;
pub mod listener;
pub mod protocol;
pub mod provider;
pub mod stage;
pub mod telemetry;

pub use connection::ConnectionManager;
pub use discovery::Channel;
pub use protocol::{FrameRate, ProtocolVersion};
pub use provider::{CasparConfig, CasparProvider};
pub use stage::{LayerSnapshot, LayerState, StageStateTree};
pub use telemetry::{DropCounters, PeakTracker, Telemetry};
