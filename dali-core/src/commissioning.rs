//! 24-bit binary-search commissioning: short-address assignment.
//!
//! Every control gear on a freshly wired DALI bus has a random 24-bit long
//! address and, usually, no short address. Commissioning finds each one in
//! turn by narrowing a 24-bit search value from the top bit down — exactly
//! the scheme the DALI standard specifies for collision-free address
//! discovery on a bus where every device can only answer YES/NO to "is your
//! address at or below this value" — and assigns it the next free short
//! address.

use heapless::Vec;

use crate::arbitration::wait_priority;
use crate::error::{DaliError, DaliResult};
use crate::frame::{Priority, SpecialAddress};
use crate::hal::LineDriver;
use crate::receiver::{Receiver, ReceiverState};
use crate::timing::BusTiming;
use crate::transmitter::send_frame;

/// Upper bound on assignable short addresses (0..=63).
const MAX_SHORT_ADDRESSES: usize = 64;

fn send_special<D: LineDriver>(
    hal: &D,
    rx: &Receiver,
    timing: &BusTiming,
    priority: Priority,
    address: SpecialAddress,
    data: u8,
) -> DaliResult<()> {
    wait_priority(hal, rx, priority)?;
    send_frame(hal, rx, timing, address.raw(), data)
}

/// Send a special command twice, as the standard requires for INITIALISE
/// and RANDOMISE.
fn send_special_twice<D: LineDriver>(
    hal: &D,
    rx: &Receiver,
    timing: &BusTiming,
    address: SpecialAddress,
    data: u8,
) -> DaliResult<()> {
    send_special(hal, rx, timing, Priority::Config, address, data)?;
    send_special(hal, rx, timing, Priority::Txn, address, data)
}

/// Wait for a backward-frame reply, or `Ok(None)` if nothing resolves into a
/// complete, well-formed frame within the backward-frame timeout.
///
/// A reply that reaches `FrameReady` with a bit count other than 8 is
/// reported as [`DaliError::BadBackFrame`]; any other outcome at the
/// timeout — including a receiver left parked mid-frame by a glitch — is
/// `Ok(None)`, the same as a clean non-reply.
fn receive_backward_frame<D: LineDriver>(
    hal: &D,
    rx: &Receiver,
    timing: &BusTiming,
) -> DaliResult<Option<u8>> {
    rx.force_state(ReceiverState::Idle);
    let start = hal.micros();
    loop {
        if rx.state() == ReceiverState::FrameReady {
            let snap = rx.snapshot();
            rx.force_state(ReceiverState::Idle);
            if snap.rcvd_bits == 8 {
                return Ok(Some(snap.rcvd_val as u8));
            }
            return Err(DaliError::BadBackFrame);
        }
        if hal.micros().wrapping_sub(start) >= timing.backward_frame_timeout_us {
            return Ok(None);
        }
        hal.yield_now();
    }
}

/// Send COMPARE and report whether any not-yet-withdrawn device's long
/// address is at or below the current search value.
fn compare<D: LineDriver>(hal: &D, rx: &Receiver, timing: &BusTiming) -> DaliResult<bool> {
    send_special(hal, rx, timing, Priority::Txn, SpecialAddress::Compare, 0x00)?;
    match receive_backward_frame(hal, rx, timing)? {
        Some(0xff) => Ok(true),
        Some(_) => Err(DaliError::BadBackFrame),
        None => Ok(false),
    }
}

fn set_search_addr<D: LineDriver>(
    hal: &D,
    rx: &Receiver,
    timing: &BusTiming,
    search_addr: u32,
) -> DaliResult<()> {
    send_special(
        hal, rx, timing, Priority::Txn, SpecialAddress::SearchAddrH,
        ((search_addr >> 16) & 0xff) as u8,
    )?;
    send_special(
        hal, rx, timing, Priority::Txn, SpecialAddress::SearchAddrM,
        ((search_addr >> 8) & 0xff) as u8,
    )?;
    send_special(
        hal, rx, timing, Priority::Txn, SpecialAddress::SearchAddrL,
        (search_addr & 0xff) as u8,
    )
}

/// Binary-search for the lowest remaining long address still answering
/// COMPARE, narrowing one bit at a time from the top.
///
/// Returns `None` once no device responds to the initial full-range
/// COMPARE (every device has already been withdrawn).
fn find_device<D: LineDriver>(hal: &D, rx: &Receiver, timing: &BusTiming) -> DaliResult<Option<u32>> {
    let mut search_addr: u32 = 0x00ff_ffff;
    set_search_addr(hal, rx, timing, search_addr)?;
    if !compare(hal, rx, timing)? {
        return Ok(None);
    }
    for bit in (0..24).rev() {
        let candidate = search_addr & !(1u32 << bit);
        set_search_addr(hal, rx, timing, candidate)?;
        if compare(hal, rx, timing)? {
            search_addr = candidate;
        }
    }
    Ok(Some(search_addr))
}

/// Run full commissioning: find every unaddressed device on the bus by
/// binary search and assign it the next free short address.
///
/// On any failure the bus is left as close to usable as it can be: a best
/// effort TERMINATE is sent before the error propagates, so one failed
/// commissioning attempt doesn't strand every ballast in addressing mode.
pub fn commission<D: LineDriver>(hal: &D, rx: &Receiver, timing: &BusTiming) -> DaliResult<Vec<u8, MAX_SHORT_ADDRESSES>> {
    let result = commission_inner(hal, rx, timing);
    if result.is_err() {
        let _ = send_special(hal, rx, timing, Priority::Txn, SpecialAddress::Terminate, 0x00);
        log::warn!("dali commissioning: aborting, best-effort TERMINATE sent");
    }
    result
}

fn commission_inner<D: LineDriver>(hal: &D, rx: &Receiver, timing: &BusTiming) -> DaliResult<Vec<u8, MAX_SHORT_ADDRESSES>> {
    let mut assigned: Vec<u8, MAX_SHORT_ADDRESSES> = Vec::new();

    send_special_twice(hal, rx, timing, SpecialAddress::Initialise, 0x00)?;
    send_special_twice(hal, rx, timing, SpecialAddress::Randomise, 0x00)?;
    // The standard requires >= 100ms settle after RANDOMISE for every
    // device's random-number generator to finish.
    hal.delay_us(100_000);

    let mut next_short = 0u8;
    loop {
        let Some(long_addr) = find_device(hal, rx, timing)? else {
            break;
        };
        if next_short as usize >= MAX_SHORT_ADDRESSES {
            log::warn!("dali commissioning: found device past the {MAX_SHORT_ADDRESSES} short-address limit");
            break;
        }
        log::debug!("dali commissioning: found long address {long_addr:#08x}, assigning short {next_short}");

        let program_data = (next_short << 1) | 1;
        send_special(hal, rx, timing, Priority::Txn, SpecialAddress::ProgramShortAddr, program_data)?;

        send_special(hal, rx, timing, Priority::Txn, SpecialAddress::VerifyShortAddr, program_data)?;
        match receive_backward_frame(hal, rx, timing)? {
            Some(0xff) => {}
            Some(_) => return Err(DaliError::BadVerifyAns),
            None => return Err(DaliError::NoVerifyAns),
        }

        assigned
            .push(next_short)
            .map_err(|_| DaliError::NoDevices)?;
        next_short += 1;

        send_special(hal, rx, timing, Priority::Txn, SpecialAddress::Withdraw, 0x00)?;
    }

    send_special(hal, rx, timing, Priority::Txn, SpecialAddress::Terminate, 0x00)?;

    if assigned.is_empty() {
        return Err(DaliError::NoDevices);
    }
    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeLine;

    /// With no devices on the bus, every COMPARE times out with no reply and
    /// commissioning reports `NoDevices`.
    #[test]
    fn empty_bus_reports_no_devices() {
        let rx = Receiver::new();
        let hal = FakeLine::new(&rx);
        let timing = BusTiming::default();
        let result = commission(&hal, &rx, &timing);
        assert_eq!(result, Err(DaliError::NoDevices));
    }
}
