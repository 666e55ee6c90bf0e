//! Bus arbitration: priority settle waits and the automatic-repeat rule.

use crate::error::{DaliError, DaliResult};
use crate::frame::{Opcode, Priority, SpecialAddress};
use crate::hal::LineDriver;
use crate::receiver::Receiver;

/// Wait out the priority settle time before sending, failing if a foreign
/// frame starts on the bus while we wait.
///
/// The bus is considered free once both of these hold: the time since the
/// last observed low edge is at least the priority's settle time, and the
/// time since we started waiting is at least the same threshold (so a
/// priority wait is never shorter than its own settle time even if the bus
/// happened to already be quiet).
pub fn wait_priority<D: LineDriver>(hal: &D, rx: &Receiver, priority: Priority) -> DaliResult<()> {
    let threshold = priority.settle_time_us();
    let wait_start = hal.micros();
    let low_at_start = rx.last_low();
    loop {
        if rx.last_low() != low_at_start {
            log::warn!("dali arbitration: lost priority wait for {priority:?}");
            return Err(DaliError::WaitPriority);
        }
        let now = hal.micros();
        let since_low = now.wrapping_sub(rx.last_low());
        let since_start = now.wrapping_sub(wait_start);
        if since_low >= threshold && since_start >= threshold {
            return Ok(());
        }
        hal.yield_now();
    }
}

/// Whether a forward frame must be sent twice in immediate succession.
///
/// Opcodes in the 32..=129 range (direct arc power control through most
/// configuration commands) and the commissioning-entry special commands
/// INITIALISE and RANDOMISE all require the bus master to repeat the frame
/// once before any other frame may be sent, per the DALI standard's
/// twice-transmission rule for commands that change device state.
pub fn requires_repeat(address: u8, data: u8) -> bool {
    if Opcode(data).requires_repeat() {
        return true;
    }
    matches!(
        SpecialAddress::try_from(address),
        Ok(SpecialAddress::Initialise) | Ok(SpecialAddress::Randomise)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BROADCAST;
    use crate::testutil::FakeLine;

    #[test]
    fn settles_after_priority_window_elapses() {
        let rx = Receiver::new();
        let hal = FakeLine::new(&rx);
        hal.advance(Priority::Query.settle_time_us() + 1);
        assert!(wait_priority(&hal, &rx, Priority::Query).is_ok());
    }

    #[test]
    fn repeat_required_for_reset_command() {
        assert!(requires_repeat(BROADCAST, Opcode::RESET.0));
    }

    #[test]
    fn repeat_not_required_for_off_or_query_commands() {
        assert!(!requires_repeat(BROADCAST, Opcode::OFF.0));
        assert!(!requires_repeat(BROADCAST, Opcode::QUERY_STATUS.0));
    }

    #[test]
    fn repeat_required_for_randomise() {
        assert!(requires_repeat(SpecialAddress::Randomise.raw(), 0x00));
    }
}
