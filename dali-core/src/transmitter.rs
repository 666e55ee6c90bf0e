//! Collision-aware Manchester transmission.
//!
//! Every bit we put on the bus is checked against what the receiver's edge
//! timestamps say actually happened out there: on a shared two-wire bus
//! another master can start driving the line at the same moment we do, and
//! the only way to notice is to look for an edge we didn't cause ourselves.

use crate::error::{DaliError, DaliResult};
use crate::hal::LineDriver;
use crate::receiver::{Receiver, ReceiverState};
use crate::timing::BusTiming;

const HALF_BIT_US: u32 = 416;

/// Send a single Manchester bit, failing if another device's edge appears
/// where only ours should.
fn send_bit<D: LineDriver>(hal: &D, rx: &Receiver, bit: bool, on_collision: DaliError) -> DaliResult<()> {
    if bit {
        hal.pull_bus_low();
        hal.delay_us(HALF_BIT_US);
        let before = rx.last_low();
        hal.release_bus();
        hal.delay_us(HALF_BIT_US);
        if rx.last_low() != before {
            return Err(on_collision);
        }
    } else {
        let before = rx.last_low();
        hal.release_bus();
        hal.delay_us(HALF_BIT_US);
        if rx.last_low() != before {
            return Err(on_collision);
        }
        hal.pull_bus_low();
        hal.delay_us(HALF_BIT_US);
    }
    Ok(())
}

fn send_byte<D: LineDriver>(hal: &D, rx: &Receiver, byte: u8, on_collision: DaliError) -> DaliResult<()> {
    for i in (0..8).rev() {
        let bit = (byte >> i) & 1 == 1;
        send_bit(hal, rx, bit, on_collision)?;
    }
    Ok(())
}

/// Polling granularity for the stop-bit wait below. Small enough not to
/// overshoot the 2400 µs window by much, coarse enough to keep the loop
/// iteration count sane.
const STOP_BIT_POLL_US: u32 = 100;

/// Wait for the stop-bit window, busy-waiting in small steps rather than a
/// single fixed delay so an intervening low edge from another device can be
/// caught wherever in the window it lands.
///
/// Per spec this holds until *both* "released for 2400 µs" and "2400 µs
/// since the last observed low" are satisfied, since a low that lands late
/// in the window pushes the quiet-time requirement out further.
fn send_stop_bit<D: LineDriver>(hal: &D, rx: &Receiver, timing: &BusTiming) -> DaliResult<()> {
    hal.release_bus();
    let released_at = hal.micros();
    loop {
        if rx.last_low() > released_at {
            return Err(DaliError::SendStop);
        }
        let now = hal.micros();
        let since_released = now.wrapping_sub(released_at);
        let since_low = now.wrapping_sub(rx.last_low());
        if since_released >= timing.stop_bit_timer_us && since_low >= timing.stop_bit_timer_us {
            return Ok(());
        }
        hal.delay_us(STOP_BIT_POLL_US);
    }
}

/// Send one forward frame: start bit, address byte, data byte, stop bit.
///
/// On success the receiver is left `Idle`. On any collision it is left at
/// `StartBitH1`, on the assumption that the edge which beat us is a foreign
/// start bit worth decoding.
pub fn send_frame<D: LineDriver>(
    hal: &D,
    rx: &Receiver,
    timing: &BusTiming,
    address: u8,
    data: u8,
) -> DaliResult<()> {
    rx.begin_sending();
    let result = (|| {
        send_bit(hal, rx, true, DaliError::SendStartBit)?;
        send_byte(hal, rx, address, DaliError::SendAddr)?;
        send_byte(hal, rx, data, DaliError::SendMsg)?;
        send_stop_bit(hal, rx, timing)
    })();
    match result {
        Ok(()) => {
            rx.force_state(ReceiverState::Idle);
            log::debug!("dali tx: sent frame {:#04x}{:#04x}", address, data);
        }
        Err(e) => {
            rx.force_state(ReceiverState::StartBitH1);
            log::warn!("dali tx: {e}");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeLine;

    #[test]
    fn uncontested_frame_send_leaves_receiver_idle() {
        let rx = Receiver::new();
        let hal = FakeLine::new(&rx);
        let timing = BusTiming::default();
        let result = send_frame(&hal, &rx, &timing, 0xFF, 0x00);
        assert!(result.is_ok());
        assert_eq!(rx.state(), ReceiverState::Idle);
    }
}
