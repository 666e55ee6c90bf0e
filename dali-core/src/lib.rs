//! Line-level protocol engine for a bit-banged DALI lighting bus.
//!
//! This crate decodes and encodes Manchester-coded frames on a two-wire DALI
//! bus, arbitrates access to the shared line against other bus masters, and
//! runs the 24-bit binary-search commissioning procedure used to assign short
//! addresses. It does not know about any particular microcontroller's GPIO or
//! timer peripherals (see [`hal::LineDriver`]), does not wrap individual lamp
//! commands in convenience methods, and keeps no debug history ring of past
//! frames; all three are the concern of a higher layer built on top.
#![cfg_attr(not(test), no_std)]

pub mod arbitration;
pub mod commissioning;
pub mod driver;
pub mod error;
pub mod frame;
pub mod hal;
pub mod receiver;
pub mod timing;
pub mod transmitter;

#[cfg(test)]
mod testutil;

pub use driver::Dali;
pub use error::{DaliError, DaliResult};
pub use hal::{LineDriver, LineLevel};
