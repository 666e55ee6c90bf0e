//! Frame Codec: packing and unpacking forward/backward DALI frames.
//!
//! A forward frame carries an address byte and an opcode/data byte; a
//! backward (reply) frame carries one raw byte. Manchester encoding and bus
//! timing live in [`crate::timing`] and [`crate::transmitter`]; this module
//! is only concerned with the byte-level layout.

use arbitrary_int::u6;
use bitbybit::bitfield;

/// Bus-access priority, determining the minimum idle time before a new
/// forward frame may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    /// Used for every forward frame within a transaction except the first.
    Txn = 1,
    /// Used to execute user-instigated actions.
    User = 2,
    /// Used for configuration of a bus unit.
    Config = 3,
    /// Used to execute automatic actions.
    Auto = 4,
    /// Used for periodic query commands.
    Query = 5,
}

impl Priority {
    /// The minimum bus-idle time, in microseconds, required before a frame
    /// of this priority may start: `12000 + 1000 * priority`.
    pub const fn settle_time_us(self) -> u32 {
        12_000 + 1_000 * (self as u32)
    }
}

/// Bit layout of a short-address forward-frame address byte.
///
/// Bit 0 selects command-vs-DAPC, bits 1..=6 are the 6-bit short address,
/// bit 7 distinguishes the short-address form (0) from the group form (1).
#[bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct ShortAddressByte {
    /// 0 selects DAPC (the opcode byte is a direct light level 0..255), 1
    /// selects an indirect command (the opcode byte is a command code).
    #[bit(0, rw)]
    pub command: bool,
    /// The 6-bit short address, 0..=63.
    #[bits(1..=6, rw)]
    pub address: u6,
    /// 0 for the short-address form. (The group form, bit 7 = 1, is not
    /// otherwise modeled by this core.)
    #[bit(7, rw)]
    pub group_form: bool,
}

impl ShortAddressByte {
    /// Build the address byte for short address `addr` (0..=63).
    pub fn new(addr: u8, command: bool) -> Self {
        debug_assert!(addr <= 63, "short address out of range: {addr}");
        Self::new_with_raw_value(0)
            .with_command(command)
            .with_address(u6::new(addr & 0x3f))
            .with_group_form(false)
    }
}

/// The reserved "special" forward-frame address bytes used during
/// commissioning and configuration. Bit 0 is always 1 (command form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecialAddress {
    /// Exit addressing mode.
    Terminate = 0xa1,
    /// Load the data byte into data-transfer register 0.
    Dtr0 = 0xa3,
    /// Begin addressing mode.
    Initialise = 0xa5,
    /// Generate random long addresses.
    Randomise = 0xa7,
    /// Test if any ballast's long address is <= SEARCHADDR.
    Compare = 0xa9,
    /// Exclude the matching ballast from further COMPARE.
    Withdraw = 0xab,
    /// Liveness probe.
    Ping = 0xad,
    /// Set the high byte of the 24-bit comparison value.
    SearchAddrH = 0xb1,
    /// Set the middle byte of the 24-bit comparison value.
    SearchAddrM = 0xb3,
    /// Set the low byte of the 24-bit comparison value.
    SearchAddrL = 0xb5,
    /// Assign a short address: data byte is `(short_addr << 1) | 1`.
    ProgramShortAddr = 0xb7,
    /// Confirm a short address assignment.
    VerifyShortAddr = 0xb9,
    /// Read the current short address.
    QueryShortAddr = 0xbb,
    /// Enable a device type for subsequent commands.
    EnableDeviceType = 0xc1,
    /// Load the data byte into data-transfer register 1.
    Dtr1 = 0xc3,
    /// Load the data byte into data-transfer register 2.
    Dtr2 = 0xc5,
    /// Write a memory location.
    WriteMemoryLocation = 0xc7,
}

impl SpecialAddress {
    /// The raw address byte value.
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SpecialAddress {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SpecialAddress::*;
        Ok(match value {
            0xa1 => Terminate,
            0xa3 => Dtr0,
            0xa5 => Initialise,
            0xa7 => Randomise,
            0xa9 => Compare,
            0xab => Withdraw,
            0xad => Ping,
            0xb1 => SearchAddrH,
            0xb3 => SearchAddrM,
            0xb5 => SearchAddrL,
            0xb7 => ProgramShortAddr,
            0xb9 => VerifyShortAddr,
            0xbb => QueryShortAddr,
            0xc1 => EnableDeviceType,
            0xc3 => Dtr1,
            0xc5 => Dtr2,
            0xc7 => WriteMemoryLocation,
            _ => return Err(()),
        })
    }
}

/// The broadcast address byte. Bit 0 = 1 indicates the command form.
pub const BROADCAST: u8 = 0xff;

/// A command/data opcode byte.
///
/// Represented as a transparent `u8` wrapper rather than a closed enum
/// because several ranges (scenes 0x10..=0x1f, 0x40..=0x4f, 0x50..=0x5f,
/// groups 0x60..=0x6f, 0x70..=0x7f) are parameterized by a numeric suffix
/// rather than being individually named. Named constants cover the full
/// DALI/DALI-2 standard opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const OFF: Opcode = Opcode(0x00);
    pub const UP: Opcode = Opcode(0x01);
    pub const DOWN: Opcode = Opcode(0x02);
    pub const STEP_UP: Opcode = Opcode(0x03);
    pub const STEP_DOWN: Opcode = Opcode(0x04);
    pub const RECALL_MAX: Opcode = Opcode(0x05);
    pub const RECALL_MIN: Opcode = Opcode(0x06);
    pub const STEP_DOWN_AND_OFF: Opcode = Opcode(0x07);
    pub const ON_AND_STEP_UP: Opcode = Opcode(0x08);
    pub const ENABLE_DAPC_SEQUENCE: Opcode = Opcode(0x09);
    /// DALI-2 addition.
    pub const GO_TO_LAST_ACTIVE_LEVEL: Opcode = Opcode(0x0a);

    /// `GO_TO_SCENE` base; valid for scenes 0x10..=0x1f.
    pub const GO_TO_SCENE_BASE: Opcode = Opcode(0x10);

    pub const RESET: Opcode = Opcode(0x20);
    pub const STORE_ACTUAL_LEVEL_DTR0: Opcode = Opcode(0x21);
    /// DALI-2 addition.
    pub const SAVE_PERSISTENT_VARS: Opcode = Opcode(0x22);
    /// DALI-2 addition.
    pub const SET_OPERATING_MODE: Opcode = Opcode(0x23);
    /// DALI-2 addition.
    pub const RESET_MEMORY_BANK: Opcode = Opcode(0x24);
    /// DALI-2 addition.
    pub const IDENTIFY_DEVICE: Opcode = Opcode(0x25);

    pub const SET_MAX_LEVEL: Opcode = Opcode(0x2a);
    pub const SET_MIN_LEVEL: Opcode = Opcode(0x2b);
    pub const SET_SYSTEM_FAILURE_LEVEL: Opcode = Opcode(0x2c);
    /// Requires DTR0 to hold the level first: load DTR0, then send this
    /// opcode at `Priority::Txn`.
    pub const SET_POWER_ON_LEVEL: Opcode = Opcode(0x2d);
    pub const SET_FADE_TIME: Opcode = Opcode(0x2e);
    pub const SET_FADE_RATE: Opcode = Opcode(0x2f);
    /// DALI-2 addition.
    pub const SET_EXTENDED_FADE_TIME: Opcode = Opcode(0x30);

    /// `SET_SCENE` base; valid for scenes 0x40..=0x4f.
    pub const SET_SCENE_BASE: Opcode = Opcode(0x40);
    /// `REMOVE_FROM_SCENE` base; valid for scenes 0x50..=0x5f.
    pub const REMOVE_FROM_SCENE_BASE: Opcode = Opcode(0x50);
    /// `ADD_TO_GROUP` base; valid for groups 0x60..=0x6f.
    pub const ADD_TO_GROUP_BASE: Opcode = Opcode(0x60);
    /// `REMOVE_FROM_GROUP` base; valid for groups 0x70..=0x7f.
    pub const REMOVE_FROM_GROUP_BASE: Opcode = Opcode(0x70);

    pub const SET_SHORT_ADDR: Opcode = Opcode(0x80);
    pub const ENABLE_WRITE_MEMORY: Opcode = Opcode(0x81);

    pub const QUERY_STATUS: Opcode = Opcode(0x90);
    pub const QUERY_CONTROL_GEAR_PRESENT: Opcode = Opcode(0x91);
    pub const QUERY_LAMP_FAILURE: Opcode = Opcode(0x92);
    pub const QUERY_LAMP_POWER_ON: Opcode = Opcode(0x93);
    pub const QUERY_LIMIT_ERROR: Opcode = Opcode(0x94);
    pub const QUERY_RESET_STATE: Opcode = Opcode(0x95);
    pub const QUERY_MISSING_SHORT_ADDR: Opcode = Opcode(0x96);
    pub const QUERY_VERSION_NO: Opcode = Opcode(0x97);
    pub const QUERY_CONTENT_DTR0: Opcode = Opcode(0x98);
    pub const QUERY_DEVICE_TYPE: Opcode = Opcode(0x99);
    pub const QUERY_PHYSICAL_MIN: Opcode = Opcode(0x9a);
    pub const QUERY_POWER_FAILURE: Opcode = Opcode(0x9b);
    pub const QUERY_CONTENT_DTR1: Opcode = Opcode(0x9c);
    pub const QUERY_CONTENT_DTR2: Opcode = Opcode(0x9d);
    /// DALI-2 addition.
    pub const QUERY_OPERATING_MODE: Opcode = Opcode(0x9e);
    /// DALI-2 addition.
    pub const QUERY_LIGHT_SOURCE_TYPE: Opcode = Opcode(0x9f);

    pub const QUERY_ACTUAL_LEVEL: Opcode = Opcode(0xa0);
    pub const QUERY_MAX_LEVEL: Opcode = Opcode(0xa1);
    pub const QUERY_MIN_LEVEL: Opcode = Opcode(0xa2);
    pub const QUERY_POWER_ON_LEVEL: Opcode = Opcode(0xa3);
    pub const QUERY_SYSTEM_FAILURE_LEVEL: Opcode = Opcode(0xa4);
    pub const QUERY_FADE_TIME_RATE: Opcode = Opcode(0xa5);
    /// DALI-2 addition.
    pub const QUERY_MFR_SPECIFIC_MODE: Opcode = Opcode(0xa6);
    /// DALI-2 addition.
    pub const QUERY_NEXT_DEVICE_TYPE: Opcode = Opcode(0xa7);
    /// DALI-2 addition.
    pub const QUERY_EXTENDED_FADE_TIME: Opcode = Opcode(0xa8);
    /// DALI-2 addition.
    pub const QUERY_CONTROL_GEAR_FAILURE: Opcode = Opcode(0xaa);

    /// `QUERY_SCENE_LEVEL` base; valid for scenes 0xb0..=0xbf.
    pub const QUERY_SCENE_LEVEL_BASE: Opcode = Opcode(0xb0);

    pub const QUERY_GROUP_0_7: Opcode = Opcode(0xc0);
    pub const QUERY_GROUP_8_15: Opcode = Opcode(0xc1);
    pub const QUERY_RANDOM_ADDR_H: Opcode = Opcode(0xc2);
    pub const QUERY_RANDOM_ADDR_M: Opcode = Opcode(0xc3);
    pub const QUERY_RANDOM_ADDR_L: Opcode = Opcode(0xc4);
    pub const READ_MEMORY_LOC: Opcode = Opcode(0xc5);

    /// Base of the manufacturer/application-extension opcode range.
    pub const APP_EXT_CMD_BASE: Opcode = Opcode(0xe0);

    /// A direct-arc-power-control level, 0..=255, sent as a DAPC opcode
    /// (short-address form with `command = false`).
    pub const fn dapc_level(level: u8) -> Opcode {
        Opcode(level)
    }

    /// Whether sending this opcode requires automatic repetition at
    /// `Priority::Txn`: opcode bytes 32..=129 inclusive.
    pub const fn requires_repeat(self) -> bool {
        self.0 >= 32 && self.0 <= 129
    }
}

/// A decoded or to-be-encoded forward frame: address byte + opcode/data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardFrame {
    pub address: u8,
    pub data: u8,
}

impl ForwardFrame {
    pub const fn new(address: u8, data: u8) -> Self {
        ForwardFrame { address, data }
    }

    /// Pack into the 16-bit value the receiver's shift register accumulates
    /// (address byte in bits 15..=8, data byte in bits 7..=0).
    pub const fn to_bits(self) -> u16 {
        ((self.address as u16) << 8) | self.data as u16
    }

    /// Unpack from the receiver's 16-bit shift register value.
    pub const fn from_bits(bits: u16) -> Self {
        ForwardFrame {
            address: (bits >> 8) as u8,
            data: bits as u8,
        }
    }
}

/// A decoded backward (reply) frame: one raw byte.
///
/// A value of `0xFF` means YES for a compare/verify operation; the absence
/// of a reply (the bus stays idle through the timeout) means NO and is
/// represented at a higher level, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackwardFrame(pub u8);

impl BackwardFrame {
    /// The reply value that means YES for compare/verify operations.
    pub const YES: BackwardFrame = BackwardFrame(0xff);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_settle_times() {
        assert_eq!(Priority::Txn.settle_time_us(), 13_000);
        assert_eq!(Priority::User.settle_time_us(), 14_000);
        assert_eq!(Priority::Config.settle_time_us(), 15_000);
        assert_eq!(Priority::Auto.settle_time_us(), 16_000);
        assert_eq!(Priority::Query.settle_time_us(), 17_000);
    }

    #[test]
    fn short_address_byte_round_trips() {
        let b = ShortAddressByte::new(5, false);
        assert_eq!(b.raw_value(), 0b0000_1010);
        assert_eq!(b.address().value(), 5);
        assert!(!b.command());
        assert!(!b.group_form());
    }

    #[test]
    fn broadcast_off_forward_frame_bits() {
        let f = ForwardFrame::new(BROADCAST, Opcode::OFF.0);
        assert_eq!(f.to_bits(), 0xFF00);
        assert_eq!(ForwardFrame::from_bits(0xFF00), f);
    }

    #[test]
    fn special_address_round_trips() {
        assert_eq!(SpecialAddress::try_from(0xa5), Ok(SpecialAddress::Initialise));
        assert_eq!(SpecialAddress::Compare.raw(), 0xa9);
        assert!(SpecialAddress::try_from(0x00).is_err());
    }

    #[test]
    fn repeat_range_is_inclusive_32_to_129() {
        assert!(!Opcode(31).requires_repeat());
        assert!(Opcode(32).requires_repeat());
        assert!(Opcode(129).requires_repeat());
        assert!(!Opcode(130).requires_repeat());
    }
}
