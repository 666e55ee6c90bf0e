//! The hardware collaborator contract.
//!
//! Everything in this module is an interface only: no GPIO, timer, or board
//! wiring ships in this crate (see the crate-level docs). A board support
//! crate implements [`LineDriver`] for its concrete pins and timer, and is
//! responsible for routing its input-edge and stop-bit-timer interrupts to
//! [`crate::driver::Dali::on_rising_edge`], [`crate::driver::Dali::on_falling_edge`]
//! and [`crate::driver::Dali::on_stop_timer`] respectively. That final step of
//! binding a concrete interrupt vector to those methods is itself application
//! wiring and stays out of scope here too.
//!
//! All methods take `&self` rather than `&mut self`: an implementor is called
//! from interrupt context as well as from foreground code, so it must hold its
//! mutable state (the GPIO peripheral, the timer peripheral) behind interior
//! mutability, the same way [`crate::receiver::Receiver`] holds its own state.

/// The observed level of the bus sense line.
///
/// The transistor level shifter on real hardware inverts bus polarity
/// ("logical high on the bus" is "GPIO low" at the microcontroller pin); a
/// [`LineDriver`] implementation absorbs that inversion so this crate never
/// has to reason about it. A released, idle bus reads [`LineLevel::High`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    /// The bus is high (idle, or a Manchester high half-bit).
    High,
    /// The bus is pulled low by some device (possibly us).
    Low,
}

/// The collaborator every `dali-core` driver is generic over.
///
/// Implemented by board support code against one GPIO input pin, one GPIO
/// output pin (open-collector, driving the bus low when asserted), and one
/// one-shot hardware timer used for stop-bit detection.
pub trait LineDriver {
    /// Pull the bus low (assert the open-collector output).
    fn pull_bus_low(&self);

    /// Release the bus (let it float/pull back up to idle-high).
    fn release_bus(&self);

    /// Read the current level of the bus sense input.
    fn read_line(&self) -> LineLevel;

    /// A free-running monotonic microsecond clock.
    fn micros(&self) -> u32;

    /// Arm the one-shot stop-bit timer to fire after `micros` microseconds.
    /// Replaces any previously armed timer.
    fn arm_stop_timer(&self, micros: u32);

    /// Cancel a previously armed stop-bit timer, if any.
    fn disable_timer(&self);

    /// Busy-wait for approximately `micros` microseconds. Must not yield to
    /// the host scheduler: this is used inside Manchester half-bit timing,
    /// where giving up the core would destroy frame timing.
    fn delay_us(&self, micros: u32);

    /// Cooperatively hand off to the host scheduler. Used only in arbitration
    /// waits and the backward-frame receive poll.
    fn yield_now(&self);
}
