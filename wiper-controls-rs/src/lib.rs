//! Input handling and orchestration for X9C potentiometer control panels.
//!
//! This crate turns raw switch levels and quadrature encoder phases into
//! wiper moves, and decides when the display and the persistent snapshot
//! need to hear about it. It contains no hardware access of its own: the
//! potentiometers are reached through [`x9c_driver::Wiper`], storage
//! through [`RecordStore`] and the display through [`PanelSink`].
//!
//! # Pipeline
//!
//! ```text
//! raw levels ──► Debouncer ──► edges ──► Repeater ───────┐
//!                                                        ├──► Wiper::set_position
//! A/B phases ──► QuadratureDecoder ──► EncoderTracker ───┘
//!                                                        │
//!                        ControlLoop ◄───────────────────┘
//!                          ├──► PanelSink::publish   (when the refresh gate opens)
//!                          └──► Persistence::save + Wiper::store   (on commit)
//! ```
//!
//! # Time
//!
//! Every state machine takes the current time as a [`Millis`] argument
//! rather than reading a clock, so the whole crate runs unchanged on the
//! host under `cargo test`.
//!
//! # `no_std` Compatibility
//!
//! No heap allocation. Collections are `heapless` vectors sized by
//! [`MAX_CHANNELS`], [`MAX_BUTTONS`] and [`MAX_ENCODERS`].

#![cfg_attr(not(test), no_std)]

mod config;
mod control_loop;
mod debounce;
mod encoder;
mod error;
mod panel;
mod persistence;
mod quadrature;
mod repeat;
mod snapshot;

pub use config::{ControlTiming, DebounceScope, RefreshPolicy};
pub use control_loop::{
    Action, ButtonBinding, ChannelSpec, ControlLoop, InputSample, TickReport,
};
pub use debounce::{Debouncer, Edge, InputState, Level};
pub use encoder::EncoderTracker;
pub use error::{CodecError, LayoutError, PersistError};
pub use panel::{ChannelReading, Modes, NoPanel, PanelSink, PanelState, RefreshGate};
pub use persistence::{MemoryStore, Persistence, RecordStore};
pub use quadrature::QuadratureDecoder;
pub use repeat::Repeater;
pub use snapshot::{PersistedSnapshot, SnapshotField, RECORD_CAPACITY};

/// Monotonic time in milliseconds since boot.
pub type Millis = u64;

/// Maximum number of potentiometer channels a [`ControlLoop`] can drive.
pub const MAX_CHANNELS: usize = 2;

/// Maximum number of momentary switches a [`ControlLoop`] can poll.
pub const MAX_BUTTONS: usize = 8;

/// Maximum number of rotary encoders a [`ControlLoop`] can poll.
pub const MAX_ENCODERS: usize = 2;
