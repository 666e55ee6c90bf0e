//! Error kinds surfaced by the DALI protocol engine.

use thiserror::Error;

/// Failure kinds a public [`crate::driver::Dali`] operation can report.
///
/// Every fallible operation returns its own `Result<_, DaliError>` rather than
/// only updating a shared field, so two failures occurring close together
/// cannot clobber each other's provenance. [`crate::driver::Dali::last_error`]
/// mirrors the most recent one for callers that still want to poll it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaliError {
    /// Another frame started on the bus while waiting out the priority gap.
    #[error("arbitration lost: foreign frame started during priority wait")]
    WaitPriority,
    /// A collision was observed while sending the start bit.
    #[error("collision while sending start bit")]
    SendStartBit,
    /// A collision was observed while sending the address byte.
    #[error("collision while sending address byte")]
    SendAddr,
    /// A collision was observed while sending the opcode/data byte.
    #[error("collision while sending data byte")]
    SendMsg,
    /// A collision was observed while sending the stop bit.
    #[error("collision while sending stop bit")]
    SendStop,
    /// Commissioning completed without assigning any short address.
    #[error("commissioning found no unaddressed ballasts")]
    NoDevices,
    /// A backward frame was present but not a clean 8 bits, or its payload
    /// was not 0xFF when 0xFF was required.
    #[error("backward frame malformed")]
    BadBackFrame,
    /// A VERIFYSHORTADDR query got no reply within the backward-frame timeout.
    #[error("no reply to VERIFYSHORTADDR")]
    NoVerifyAns,
    /// A VERIFYSHORTADDR reply was present but not 0xFF.
    #[error("VERIFYSHORTADDR reply was not 0xFF")]
    BadVerifyAns,
}

/// Result alias for fallible DALI operations.
pub type DaliResult<T> = Result<T, DaliError>;
