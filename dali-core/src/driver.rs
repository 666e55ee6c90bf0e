//! The top-level protocol engine: one [`Dali`] per bus.
//!
//! `Dali<D>` composes a [`Receiver`] with a board-supplied [`LineDriver`] and
//! exposes the operations a higher layer needs to move frames, queries, and
//! commissioning over the bus. It borrows its `Receiver` rather than owning
//! it: board support code typically parks one in a `static` so its interrupt
//! vectors and this driver can both reach it with `'static` lifetime, the
//! same way the receiver's own fields live behind a `critical_section::Mutex`
//! rather than a `&mut self` borrow.

use core::cell::Cell;

use heapless::Vec;

use crate::arbitration::{requires_repeat, wait_priority};
use crate::error::{DaliError, DaliResult};
use crate::frame::Priority;
use crate::hal::LineDriver;
use crate::receiver::{Receiver, ReceiverState};
use crate::timing::BusTiming;
use crate::{commissioning, transmitter};

/// A DALI bus protocol engine over hardware collaborator `D`.
pub struct Dali<'a, D: LineDriver> {
    hal: D,
    rx: &'a Receiver,
    timing: BusTiming,
    last_error: Cell<Option<DaliError>>,
}

impl<'a, D: LineDriver> Dali<'a, D> {
    pub fn new(hal: D, rx: &'a Receiver) -> Self {
        Self::with_timing(hal, rx, BusTiming::default())
    }

    pub fn with_timing(hal: D, rx: &'a Receiver, timing: BusTiming) -> Self {
        Dali {
            hal,
            rx,
            timing,
            last_error: Cell::new(None),
        }
    }

    /// Release the bus and leave the receiver idle, ready to decode.
    pub fn init(&self) {
        self.hal.release_bus();
        self.hal.disable_timer();
    }

    /// The most recent error any operation on this bus reported.
    ///
    /// Every fallible method here also returns its own `Result`; prefer
    /// matching on that. This accessor exists only for callers that want to
    /// poll state after the fact instead of threading the `Result` through.
    pub fn last_error(&self) -> Option<DaliError> {
        self.last_error.get()
    }

    fn record<T>(&self, result: DaliResult<T>) -> DaliResult<T> {
        if let Err(e) = result {
            self.last_error.set(Some(e));
        }
        result
    }

    /// Arbitrate for the bus at `priority` and send one forward frame.
    pub fn send_frame(&self, priority: Priority, address: u8, data: u8) -> DaliResult<()> {
        let result = (|| {
            wait_priority(&self.hal, self.rx, priority)?;
            transmitter::send_frame(&self.hal, self.rx, &self.timing, address, data)
        })();
        self.record(result)
    }

    /// Send a forward frame, automatically repeating it once at
    /// `Priority::Txn` when the opcode or special address requires it.
    pub fn send_command(&self, priority: Priority, address: u8, data: u8) -> DaliResult<()> {
        self.send_frame(priority, address, data)?;
        if requires_repeat(address, data) {
            self.send_frame(Priority::Txn, address, data)?;
        }
        Ok(())
    }

    /// Send a query command and wait for the backward-frame reply.
    ///
    /// Replaces the `-1`/`-2` sentinel convention of a raw integer return
    /// with a proper `Result`: a timed-out or malformed reply is
    /// [`DaliError::BadBackFrame`], and the byte value otherwise.
    pub fn query(&self, priority: Priority, address: u8, query_opcode: u8) -> DaliResult<u8> {
        let result = (|| {
            wait_priority(&self.hal, self.rx, priority)?;
            transmitter::send_frame(&self.hal, self.rx, &self.timing, address, query_opcode)?;
            self.rx.force_state(ReceiverState::Idle);
            let start = self.hal.micros();
            loop {
                if self.rx.state() == ReceiverState::FrameReady {
                    let snap = self.rx.snapshot();
                    self.rx.force_state(ReceiverState::Idle);
                    return if snap.rcvd_bits == 8 {
                        Ok(snap.rcvd_val as u8)
                    } else {
                        Err(DaliError::BadBackFrame)
                    };
                }
                if self.hal.micros().wrapping_sub(start) >= self.timing.backward_frame_timeout_us {
                    return Err(DaliError::BadBackFrame);
                }
                self.hal.yield_now();
            }
        })();
        self.record(result)
    }

    /// Run full bus commissioning and return the newly assigned short
    /// addresses.
    pub fn commission(&self) -> DaliResult<Vec<u8, 64>> {
        let result = commissioning::commission(&self.hal, self.rx, &self.timing);
        self.record(result)
    }

    /// Route a rising-edge interrupt from board support code.
    pub fn on_rising_edge(&self) {
        self.rx.on_rising_edge(&self.hal, &self.timing);
    }

    /// Route a falling-edge interrupt from board support code.
    pub fn on_falling_edge(&self) {
        self.rx.on_falling_edge(&self.hal, &self.timing);
    }

    /// Route the stop-bit timer interrupt from board support code.
    pub fn on_stop_timer(&self) {
        self.rx.on_stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeLine;

    #[test]
    fn uncontested_send_frame_succeeds() {
        let rx = Receiver::new();
        let hal = FakeLine::new(&rx);
        let dali = Dali::new(hal, &rx);
        dali.init();
        let result = dali.send_frame(Priority::Query, 0xff, 0x00);
        assert!(result.is_ok());
        assert!(dali.last_error().is_none());
    }

    #[test]
    fn query_with_no_reply_is_malformed_not_silent() {
        let rx = Receiver::new();
        let hal = FakeLine::new(&rx);
        let dali = Dali::new(hal, &rx);
        dali.init();
        let result = dali.query(Priority::Query, 0xff, 0x90);
        assert_eq!(result, Err(DaliError::BadBackFrame));
        assert_eq!(dali.last_error(), Some(DaliError::BadBackFrame));
    }
}
