// src/error.rs
//! Error types shared by the router control plane.
//!
//! None of these ever escape `tick` / `handle_hello`; the engines absorb them
//! and report through the adapter's log instead.

use thiserror::Error;

/// Failure to rebuild a protocol object from its keyed encoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed protocol body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("mandatory protocol field is empty: '{0}'")]
    EmptyField(&'static str),

    #[error("link state for {0} lists itself as a peer")]
    SelfPeer(String),

    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
}

/// Rejected router configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("router id must not be empty")]
    EmptyRouterId,

    #[error("area must not be empty")]
    EmptyArea,

    #[error("hello interval must be non-zero")]
    ZeroHelloInterval,

    #[error("hold time ({hold_ms} ms) must exceed the hello interval ({hello_ms} ms)")]
    HoldTimeTooShort { hold_ms: u128, hello_ms: u128 },

    #[error("mobile address max age must be non-zero")]
    ZeroMobileAddrMaxAge,
}

/// Failure to frame or unframe a control message for the wire.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame truncated: {0}")]
    Truncated(#[from] std::io::Error),

    #[error("bad frame header: magic={magic} version={version}")]
    BadHeader { magic: u8, version: u8 },

    #[error("opcode is not valid utf-8")]
    BadOpcode,

    #[error("field too long for frame: {0} bytes")]
    TooLong(usize),

    #[error("frame body: {0}")]
    Body(#[from] serde_json::Error),
}
