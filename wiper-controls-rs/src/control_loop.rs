//! Per-tick orchestration of inputs, channels, display and persistence.

use heapless::Vec;
use x9c_driver::{clamp_position, Wiper};

use crate::config::ControlTiming;
use crate::debounce::{Debouncer, Edge, InputState, Level};
use crate::encoder::EncoderTracker;
use crate::error::LayoutError;
use crate::panel::{ChannelReading, Modes, PanelSink, PanelState, RefreshGate};
use crate::persistence::{Persistence, RecordStore};
use crate::repeat::Repeater;
use crate::snapshot::{PersistedSnapshot, SnapshotField};
use crate::{Millis, MAX_BUTTONS, MAX_CHANNELS, MAX_ENCODERS};

/// What a momentary switch does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Move `channel` by `delta` steps. With `repeat`, keep moving while held.
    Step { channel: usize, delta: i8, repeat: bool },
    /// Save all positions and commit every wiper to its non-volatile cell.
    Store,
    /// Flip bypass. Leaving bypass commits like [`Action::Store`].
    ToggleBypass,
    /// Flip the boost stage.
    ToggleBoost,
}

/// A momentary switch and the level it reads when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonBinding {
    pub action: Action,
    pub active: Level,
}

impl ButtonBinding {
    /// Switch to ground with a pull-up.
    pub fn active_low(action: Action) -> Self {
        Self {
            action,
            active: Level::Low,
        }
    }
}

/// Static description of one potentiometer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSpec {
    /// Label shown on the panel.
    pub label: &'static str,
    /// Field the channel is stored under.
    pub field: SnapshotField,
}

/// Raw input levels sampled at the start of a tick.
///
/// `buttons[i]` is the electrical level (`true` = high) of the `i`-th
/// button added to the loop; `encoder_counts[i]` is the wrapping detent
/// counter of the `i`-th encoder. Missing button entries read as released;
/// missing encoder entries skip that encoder for the tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSample<'a> {
    pub buttons: &'a [bool],
    pub encoder_counts: &'a [i32],
}

/// What happened during one [`ControlLoop::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// At least one wiper moved.
    pub moved: bool,
    /// A mode flag flipped.
    pub modes_changed: bool,
    /// Positions were saved and committed.
    pub committed: bool,
    /// A frame was handed to the panel.
    pub published: bool,
}

struct Channel<W> {
    wiper: W,
    spec: ChannelSpec,
}

struct Button {
    binding: ButtonBinding,
    state: InputState,
}

struct Encoder {
    channel: usize,
    tracker: EncoderTracker,
}

/// The control loop: owns every channel, input state and collaborator.
///
/// Build the layout with [`add_channel`](Self::add_channel),
/// [`add_button`](Self::add_button) and [`add_encoder`](Self::add_encoder),
/// call [`start`](Self::start) once, then [`tick`](Self::tick) at a fixed
/// cadence.
///
/// Every wiper move happens synchronously inside `tick`, so a pulse train
/// always completes before the next input is looked at.
pub struct ControlLoop<W, S, P> {
    channels: Vec<Channel<W>, MAX_CHANNELS>,
    buttons: Vec<Button, MAX_BUTTONS>,
    encoders: Vec<Encoder, MAX_ENCODERS>,
    debouncer: Debouncer,
    repeater: Repeater,
    persistence: Persistence<S>,
    panel: P,
    refresh: RefreshGate,
    modes: Modes,
}

impl<W, S, P> ControlLoop<W, S, P>
where
    W: Wiper,
    S: RecordStore,
    P: PanelSink,
{
    pub fn new(timing: ControlTiming, persistence: Persistence<S>, panel: P) -> Self {
        Self {
            channels: Vec::new(),
            buttons: Vec::new(),
            encoders: Vec::new(),
            debouncer: Debouncer::new(timing.debounce_ms, timing.debounce_scope),
            repeater: Repeater::new(timing.initial_delay_ms, timing.repeat_interval_ms),
            persistence,
            panel,
            refresh: RefreshGate::new(timing.refresh),
            modes: Modes::default(),
        }
    }

    // ── Layout ───────────────────────────────────────────────────────

    /// Add a channel. Returns its index.
    pub fn add_channel(&mut self, wiper: W, spec: ChannelSpec) -> Result<usize, LayoutError> {
        self.channels
            .push(Channel { wiper, spec })
            .map_err(|_| LayoutError::TooManyChannels)?;
        Ok(self.channels.len() - 1)
    }

    /// Add a button. Its index is its position in [`InputSample::buttons`].
    pub fn add_button(&mut self, binding: ButtonBinding) -> Result<usize, LayoutError> {
        if let Action::Step { channel, .. } = binding.action {
            self.check_channel(channel)?;
        }
        self.buttons
            .push(Button {
                binding,
                state: InputState::new(binding.active),
            })
            .map_err(|_| LayoutError::TooManyButtons)?;
        Ok(self.buttons.len() - 1)
    }

    /// Bind an encoder to `channel`, starting from the counter's current
    /// value. Its index is its position in [`InputSample::encoder_counts`].
    pub fn add_encoder(&mut self, channel: usize, initial_count: i32) -> Result<usize, LayoutError> {
        self.check_channel(channel)?;
        let position = self.channels[channel].wiper.position();
        self.encoders
            .push(Encoder {
                channel,
                tracker: EncoderTracker::new(initial_count, position),
            })
            .map_err(|_| LayoutError::TooManyEncoders)?;
        Ok(self.encoders.len() - 1)
    }

    // ── Running ──────────────────────────────────────────────────────

    /// Restore stored positions and publish the first frame.
    ///
    /// Every channel is driven to its stored step (or the center step when
    /// nothing usable is stored) with a full calibration train, which is
    /// what brings the logical and physical positions into agreement after
    /// power-on.
    pub fn start(&mut self, now: Millis) {
        let snapshot = self.persistence.load().unwrap_or_default();

        for index in 0..self.channels.len() {
            let target = snapshot.position_or_default(self.channels[index].spec.field);
            self.apply(index, target as i32);
        }

        #[cfg(feature = "defmt")]
        defmt::info!("control loop started with {} channel(s)", self.channels.len());

        self.refresh.mark_dirty();
        self.publish_if_due(now);
    }

    /// Process one poll cycle.
    pub fn tick(&mut self, now: Millis, sample: &InputSample) -> TickReport {
        let mut report = TickReport::default();
        let mut commit = false;

        for index in 0..self.buttons.len() {
            let button = &mut self.buttons[index];
            let raw = sample
                .buttons
                .get(index)
                .map(|&high| Level::from_high(high))
                .unwrap_or(button.state.released_level());

            let edge = self.debouncer.poll(&mut button.state, raw, now);
            let action = button.binding.action;
            let fire = match action {
                Action::Step { repeat: true, .. } => {
                    self.repeater.poll(&mut button.state, edge, now)
                }
                _ => edge == Some(Edge::Pressed),
            };
            if !fire {
                continue;
            }

            match action {
                Action::Step { channel, delta, .. } => {
                    report.moved |= self.nudge(channel, delta as i32);
                }
                Action::Store => commit = true,
                Action::ToggleBypass => {
                    self.modes.bypass = !self.modes.bypass;
                    report.modes_changed = true;
                    // Back in circuit: the current setting is the one to keep.
                    if !self.modes.bypass {
                        commit = true;
                    }
                }
                Action::ToggleBoost => {
                    self.modes.boost = !self.modes.boost;
                    report.modes_changed = true;
                }
            }
        }

        for index in 0..self.encoders.len() {
            let Some(&count) = sample.encoder_counts.get(index) else {
                continue;
            };
            let channel = self.encoders[index].channel;
            let commanded = self.channels[channel].wiper.position();
            if let Some(target) = self.encoders[index].tracker.poll(count, commanded) {
                report.moved |= self.apply(channel, target as i32);
            }
        }

        if report.modes_changed {
            #[cfg(feature = "defmt")]
            defmt::info!("modes: {}", self.modes);
            self.refresh.mark_dirty();
        }

        if commit {
            self.commit();
            report.committed = true;
        }

        report.published = self.publish_if_due(now);
        report
    }

    // ── State access ─────────────────────────────────────────────────

    /// Last commanded step of `channel`.
    pub fn position(&self, channel: usize) -> Option<u8> {
        self.channels.get(channel).map(|c| c.wiper.position())
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn wiper(&self, channel: usize) -> Option<&W> {
        self.channels.get(channel).map(|c| &c.wiper)
    }

    pub fn input_state(&self, button: usize) -> Option<&InputState> {
        self.buttons.get(button).map(|b| &b.state)
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// Current positions in persisted form.
    pub fn snapshot(&self) -> PersistedSnapshot {
        let mut snapshot = PersistedSnapshot::default();
        for channel in &self.channels {
            snapshot.set(channel.spec.field, channel.wiper.position());
        }
        snapshot
    }

    /// Current frame contents.
    pub fn panel_state(&self) -> PanelState {
        let mut state = PanelState {
            modes: self.modes,
            ..PanelState::default()
        };
        for (slot, channel) in state.channels.iter_mut().zip(self.channels.iter()) {
            *slot = Some(ChannelReading {
                label: channel.spec.label,
                position: channel.wiper.position(),
            });
        }
        state
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn check_channel(&self, channel: usize) -> Result<(), LayoutError> {
        if channel < self.channels.len() {
            Ok(())
        } else {
            Err(LayoutError::UnknownChannel)
        }
    }

    /// Relative move through the clamp-then-set path. A move that clamps
    /// to the current step is skipped.
    fn nudge(&mut self, channel: usize, delta: i32) -> bool {
        let current = self.channels[channel].wiper.position();
        let target = clamp_position(current as i32 + delta);
        if target == current {
            #[cfg(feature = "defmt")]
            defmt::debug!("channel {} already at {}", channel, current);
            return false;
        }
        self.apply(channel, target as i32)
    }

    /// Absolute move. Re-binds encoders on the channel and marks the panel
    /// dirty on success; logs and carries on if the lines fail.
    fn apply(&mut self, channel: usize, target: i32) -> bool {
        match self.channels[channel].wiper.set_position(target) {
            Ok(applied) => {
                for encoder in self.encoders.iter_mut().filter(|e| e.channel == channel) {
                    encoder.tracker.rebind(applied);
                }
                self.refresh.mark_dirty();
                true
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::error!("channel {}: move to {} failed", channel, target);
                false
            }
        }
    }

    /// Save the snapshot, then commit every wiper.
    fn commit(&mut self) {
        let snapshot = self.snapshot();
        if let Err(_e) = self.persistence.save(&snapshot) {
            #[cfg(feature = "defmt")]
            defmt::warn!("saving snapshot failed: {}", _e);
        }

        for (_index, channel) in self.channels.iter_mut().enumerate() {
            if channel.wiper.store().is_err() {
                #[cfg(feature = "defmt")]
                defmt::error!("channel {}: store failed", _index);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!("positions committed");
    }

    fn publish_if_due(&mut self, now: Millis) -> bool {
        if !self.refresh.poll(now) {
            return false;
        }
        let state = self.panel_state();
        self.panel.publish(&state);
        true
    }
}
