//! A hand-rolled [`LineDriver`] test double.
//!
//! `embedded-hal-mock`'s transaction-queue model fits a driver that issues a
//! fixed sequence of pin reads/writes, not one where the ISR and foreground
//! code race over shared state; a small `Cell`-based fake models that more
//! directly. It wires its own bus writes back into the [`Receiver`] it's
//! built with, the same way real hardware's edge interrupt fires for edges
//! the transmitter itself causes — that loopback is what makes collision
//! detection testable at all. Used only by `#[cfg(test)]` code in this crate.

use core::cell::Cell;

use crate::hal::{LineDriver, LineLevel};
use crate::receiver::Receiver;
use crate::timing::BusTiming;

pub struct FakeLine<'a> {
    rx: &'a Receiver,
    timing: BusTiming,
    now: Cell<u32>,
    line: Cell<LineLevel>,
    timer_armed: Cell<bool>,
}

impl<'a> FakeLine<'a> {
    pub fn new(rx: &'a Receiver) -> Self {
        FakeLine {
            rx,
            timing: BusTiming::default(),
            now: Cell::new(0),
            line: Cell::new(LineLevel::High),
            timer_armed: Cell::new(false),
        }
    }

    pub fn advance(&self, micros: u32) {
        self.now.set(self.now.get() + micros);
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed.get()
    }
}

impl<'a> LineDriver for FakeLine<'a> {
    fn pull_bus_low(&self) {
        self.line.set(LineLevel::Low);
        self.rx.on_falling_edge(self, &self.timing);
    }

    fn release_bus(&self) {
        self.line.set(LineLevel::High);
        self.rx.on_rising_edge(self, &self.timing);
    }

    fn read_line(&self) -> LineLevel {
        self.line.get()
    }

    fn micros(&self) -> u32 {
        self.now.get()
    }

    fn arm_stop_timer(&self, _micros: u32) {
        self.timer_armed.set(true);
    }

    fn disable_timer(&self) {
        self.timer_armed.set(false);
    }

    fn delay_us(&self, micros: u32) {
        self.advance(micros);
    }

    fn yield_now(&self) {
        // Simulate cooperative scheduling actually taking some time, so
        // polling loops built on this primitive make progress under test.
        self.advance(50);
    }
}
