//! wiper-hw-interface
//!
//! Front-panel firmware for X9C digital potentiometers on the Raspberry Pi
//! Pico 2. Wires the library crates into a live control loop:
//!
//! 1. The control task wakes every `tick_ms` (10 ms), samples the button
//!    levels and the encoder counters, and hands them to the `ControlLoop`.
//! 2. The loop debounces, applies hold-to-repeat, and moves the wipers with
//!    blocking pulse trains. Nothing else runs while a train is on the wire.
//! 3. STORE (or leaving bypass) writes the positions to the last flash
//!    sector and commits each wiper to its own non-volatile cell.
//! 4. With `tone-stack`, the encoder tasks decode A/B edges into shared
//!    counters, the relays follow the mode flags, and frames go to the OLED
//!    task through a `Signal` so the control task never waits on I2C.
//!
//! # Builds
//!
//! | Feature      | Channels       | Inputs                                |
//! |--------------|----------------|---------------------------------------|
//! | *(default)*  | Level          | UP, DOWN (hold to repeat), STORE       |
//! | `tone-stack` | Bass, Treble   | 2 encoders, BYPASS, BOOST, STORE       |

#![no_std]
#![no_main]

mod flash_store;

use core::sync::atomic::{AtomicI32, Ordering};

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::gpio::{self, Input, Output, Pull};
use embassy_rp::Peri;
use embassy_time::{Delay, Duration, Instant, Ticker};
use {defmt_rtt as _, panic_probe as _};

use wiper_controls::{
    ControlLoop, ControlTiming, InputSample, Modes, Persistence, MAX_ENCODERS,
};
use x9c_driver::PotentiometerChannel;

use flash_store::FlashStore;

#[cfg(feature = "tone-stack")]
use tone_stack as build;
#[cfg(not(feature = "tone-stack"))]
use single_channel as build;

// ---------------------------------------------------------------------------
// Boot block
// ---------------------------------------------------------------------------

/// Tell the RP2350 Boot ROM about our application.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = embassy_rp::block::ImageDef::secure_exe();

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Free-running detent counters, written by the encoder tasks and read by
/// the control task. Only differences between readings are meaningful.
static ENCODER_COUNTS: [AtomicI32; MAX_ENCODERS] = [AtomicI32::new(0), AtomicI32::new(0)];

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// One X9C on three GPIO outputs, timed with the blocking embassy delay.
type Pot = PotentiometerChannel<Output<'static>, Output<'static>, Output<'static>, Delay>;

type Controls = ControlLoop<Pot, FlashStore, build::Sink>;

/// Build a channel with the lines already at their idle levels.
fn pot(
    id: u8,
    inc: Peri<'static, impl gpio::Pin>,
    ud: Peri<'static, impl gpio::Pin>,
    cs: Peri<'static, impl gpio::Pin>,
) -> Pot {
    let mut pot = PotentiometerChannel::new(
        id,
        Output::new(inc, gpio::Level::High),
        Output::new(ud, gpio::Level::Low),
        Output::new(cs, gpio::Level::High),
        Delay,
    );
    unwrap!(pot.init());
    pot
}

// ---------------------------------------------------------------------------
// Single-channel build
// ---------------------------------------------------------------------------

#[cfg(not(feature = "tone-stack"))]
mod single_channel {
    //! Pin assignments:
    //!
    //! | Signal | GPIO |
    //! |--------|------|
    //! | INC    | GP2  |
    //! | U/D    | GP3  |
    //! | CS     | GP4  |
    //! | UP     | GP10 (active-low, pull-up) |
    //! | DOWN   | GP11 (active-low, pull-up) |
    //! | STORE  | GP12 (active-low, pull-up) |

    use super::*;
    use wiper_controls::{Action, ButtonBinding, ChannelSpec, NoPanel, SnapshotField};

    pub type Sink = NoPanel;

    pub const BUTTONS: usize = 3;
    pub const ENCODERS: usize = 0;

    /// Mode flags have no outputs in this build.
    pub struct Relays;

    impl Relays {
        pub fn apply(&mut self, _modes: Modes) {}
    }

    pub fn setup(
        _spawner: &Spawner,
        p: embassy_rp::Peripherals,
        timing: ControlTiming,
    ) -> (Controls, [Input<'static>; BUTTONS], Relays) {
        let persistence = Persistence::new(FlashStore::new(p.FLASH));
        let mut controls = ControlLoop::new(timing, persistence, NoPanel);

        let level = unwrap!(controls.add_channel(
            pot(0, p.PIN_2, p.PIN_3, p.PIN_4),
            ChannelSpec {
                label: "Level",
                field: SnapshotField::Position,
            },
        ));
        for delta in [1, -1] {
            unwrap!(controls.add_button(ButtonBinding::active_low(Action::Step {
                channel: level,
                delta,
                repeat: true,
            })));
        }
        unwrap!(controls.add_button(ButtonBinding::active_low(Action::Store)));

        let buttons = [
            Input::new(p.PIN_10, Pull::Up),
            Input::new(p.PIN_11, Pull::Up),
            Input::new(p.PIN_12, Pull::Up),
        ];

        (controls, buttons, Relays)
    }
}

// ---------------------------------------------------------------------------
// Tone-stack build
// ---------------------------------------------------------------------------

#[cfg(feature = "tone-stack")]
mod tone_stack {
    //! Pin assignments:
    //!
    //! | Signal            | GPIO                          |
    //! |-------------------|-------------------------------|
    //! | Bass INC/UD/CS    | GP2 / GP3 / GP4               |
    //! | Treble INC/UD/CS  | GP5 / GP6 / GP7               |
    //! | BYPASS            | GP10 (active-low, pull-up)    |
    //! | BOOST             | GP11 (active-low, pull-up)    |
    //! | STORE             | GP12 (active-low, pull-up)    |
    //! | Bass encoder A/B  | GP14 / GP15 (pull-up)         |
    //! | Treble encoder A/B| GP16 / GP17 (pull-up)         |
    //! | Bypass relay      | GP18 (high = bypassed)        |
    //! | Boost relay       | GP19 (high = boost on)        |
    //! | I2C0 SDA / SCL    | GP20 / GP21 (OLED at 0x3C)    |

    use super::*;
    use embassy_futures::select::select;
    use embassy_rp::bind_interrupts;
    use embassy_rp::i2c::{self, I2c};
    use embassy_rp::peripherals::I2C0;
    use wiper_controls::{Action, ButtonBinding, ChannelSpec, QuadratureDecoder, SnapshotField};
    use wiper_panel::{panel_update_task, PanelConfig, PanelDriver, PanelSignal, SignalSink};

    pub type Sink = SignalSink;

    pub const BUTTONS: usize = 3;
    pub const ENCODERS: usize = 2;

    /// Valid phase transitions per mechanical click.
    const COUNTS_PER_DETENT: i8 = 4;

    /// OLED I2C address.
    const PANEL_ADDRESS: u8 = 0x3C;

    // Wire the I2C0 peripheral interrupt to Embassy's async handler.
    bind_interrupts!(struct Irqs {
        I2C0_IRQ => i2c::InterruptHandler<I2C0>;
    });

    /// Latest panel frame, written by the control task and drawn by the
    /// panel task.
    static FRAMES: PanelSignal = PanelSignal::new();

    type PanelI2c = I2c<'static, I2C0, i2c::Async>;

    /// Relay drivers following the mode flags.
    pub struct Relays {
        bypass: Output<'static>,
        boost: Output<'static>,
    }

    impl Relays {
        pub fn apply(&mut self, modes: Modes) {
            self.bypass.set_level(gpio::Level::from(modes.bypass));
            self.boost.set_level(gpio::Level::from(modes.boost));
        }
    }

    /// Thin wrapper that monomorphises the generic `panel_update_task` so it
    /// can be spawned as a concrete Embassy task.
    #[embassy_executor::task]
    async fn panel_task(driver: PanelDriver<PanelI2c>, frames: &'static PanelSignal) {
        panel_update_task(driver, frames, PanelConfig::default()).await;
    }

    /// Software quadrature decoding for one encoder.
    ///
    /// Wakes on any edge of either phase, feeds the new levels to the
    /// decoder and adds completed detents to `ENCODER_COUNTS[index]`.
    #[embassy_executor::task(pool_size = 2)]
    async fn encoder_task(index: usize, mut a: Input<'static>, mut b: Input<'static>) {
        info!("Encoder {} task started", index);
        let mut decoder = QuadratureDecoder::new(a.is_high(), b.is_high(), COUNTS_PER_DETENT);

        loop {
            select(a.wait_for_any_edge(), b.wait_for_any_edge()).await;

            let step = decoder.update(a.is_high(), b.is_high());
            if step != 0 {
                ENCODER_COUNTS[index].fetch_add(step, Ordering::Relaxed);
                trace!("Encoder {}: count={}", index, decoder.count());
            }
        }
    }

    pub fn setup(
        spawner: &Spawner,
        p: embassy_rp::Peripherals,
        timing: ControlTiming,
    ) -> (Controls, [Input<'static>; BUTTONS], Relays) {
        // —— Panel ————————————————————————————————————————————————————————
        let i2c = I2c::new_async(p.I2C0, p.PIN_21, p.PIN_20, Irqs, i2c::Config::default());
        let panel = PanelDriver::new(i2c, PANEL_ADDRESS);
        unwrap!(spawner.spawn(panel_task(panel, &FRAMES)));

        // —— Channels and inputs —————————————————————————————————————————
        let persistence = Persistence::new(FlashStore::new(p.FLASH));
        let mut controls = ControlLoop::new(timing, persistence, SignalSink::new(&FRAMES));

        let bass = unwrap!(controls.add_channel(
            pot(0, p.PIN_2, p.PIN_3, p.PIN_4),
            ChannelSpec {
                label: "Bass",
                field: SnapshotField::Bass,
            },
        ));
        let treble = unwrap!(controls.add_channel(
            pot(1, p.PIN_5, p.PIN_6, p.PIN_7),
            ChannelSpec {
                label: "Treble",
                field: SnapshotField::Treble,
            },
        ));

        unwrap!(controls.add_button(ButtonBinding::active_low(Action::ToggleBypass)));
        unwrap!(controls.add_button(ButtonBinding::active_low(Action::ToggleBoost)));
        unwrap!(controls.add_button(ButtonBinding::active_low(Action::Store)));

        let buttons = [
            Input::new(p.PIN_10, Pull::Up),
            Input::new(p.PIN_11, Pull::Up),
            Input::new(p.PIN_12, Pull::Up),
        ];

        // Encoders bind to the counters as they are now; the tasks only
        // ever add to them.
        for (index, channel) in [bass, treble].into_iter().enumerate() {
            let count = ENCODER_COUNTS[index].load(Ordering::Relaxed);
            unwrap!(controls.add_encoder(channel, count));
        }
        unwrap!(spawner.spawn(encoder_task(
            0,
            Input::new(p.PIN_14, Pull::Up),
            Input::new(p.PIN_15, Pull::Up),
        )));
        unwrap!(spawner.spawn(encoder_task(
            1,
            Input::new(p.PIN_16, Pull::Up),
            Input::new(p.PIN_17, Pull::Up),
        )));

        let relays = Relays {
            bypass: Output::new(p.PIN_18, gpio::Level::Low),
            boost: Output::new(p.PIN_19, gpio::Level::Low),
        };

        (controls, buttons, relays)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Fixed-cadence control loop.
///
/// Restores the stored positions first (a full calibration train per
/// channel), then polls forever. Wiper moves block this task for their
/// whole pulse train, which is the point: nothing can interleave with one.
#[embassy_executor::task]
async fn control_task(
    mut controls: Controls,
    buttons: [Input<'static>; build::BUTTONS],
    mut relays: build::Relays,
    timing: ControlTiming,
) {
    info!("Control task started");

    controls.start(Instant::now().as_millis());
    relays.apply(controls.modes());
    info!("Restored {} channel(s)", controls.channel_count());

    let mut ticker = Ticker::every(Duration::from_millis(timing.tick_ms));
    loop {
        ticker.next().await;
        let now = Instant::now().as_millis();

        let levels: [bool; build::BUTTONS] = core::array::from_fn(|i| buttons[i].is_high());
        let counts: [i32; build::ENCODERS] =
            core::array::from_fn(|i| ENCODER_COUNTS[i].load(Ordering::Relaxed));

        let report = controls.tick(
            now,
            &InputSample {
                buttons: &levels,
                encoder_counts: &counts,
            },
        );

        if report.modes_changed {
            relays.apply(controls.modes());
        }
        if report.committed {
            info!("Positions stored");
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("wiper-hw-interface starting");

    let timing = ControlTiming::default();
    let (controls, buttons, relays) = build::setup(&spawner, p, timing);

    unwrap!(spawner.spawn(control_task(controls, buttons, relays, timing)));

    info!("All tasks spawned");
}
