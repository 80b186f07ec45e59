//! AlienFX lighting control for Alienware laptops.
//!
//! The AlienFX controller is a USB HID device driven by fixed-length command
//! packets. Commands either paint a set of lighting zones directly or build up
//! animation blocks (color / blink / morph steps) which the controller runs on
//! its own once executed. This crate provides the packet codec, the zone
//! registry, a theme compiler for JSON theme documents, and a session layer
//! which sequences commands against the device.
//!
//! The wire protocol was mapped out by the community for the Alienware 13 R3,
//! but older controllers speak the same command set with shorter packets and
//! 4-bit color channels. Both layouts are supported, see
//! [`packet::Generation`].

pub mod command;
pub mod controller;
pub mod packet;
pub mod theme;
pub mod transport;
pub mod zone;

use std::path::PathBuf;

use thiserror::Error;

use crate::packet::ColorDepth;

/// USB vendor ID of Alienware controllers.
pub const VENDOR_ID: u16 = 0x187c;

/// USB product ID of the Alienware 13 R3 lighting controller.
pub const PRODUCT_ID: u16 = 0x0529;

/// Alias for results with lighting control errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Lighting control errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A color channel outside the 8-bit range.
    #[error("invalid color channel {0}, channels must be in 0..=255")]
    InvalidColorChannel(i64),

    /// A color literal that does not match the `0xRRGGBB` format.
    #[error("invalid color {0:?}, expected 0xRRGGBB")]
    InvalidColorFormat(String),

    /// A tempo below the minimum the controller can keep up with.
    #[error("invalid tempo {0} ms, minimum is {min} ms", min = command::MIN_TEMPO)]
    InvalidTempo(i64),

    /// A zone mask with bits beyond the 24-bit wire field.
    #[error("zone mask {0:#x} does not fit the 24-bit zone field")]
    InvalidZoneMask(u32),

    /// A custom packet layout too short for the largest command payload.
    #[error("packet length {packet_len} cannot carry a {color_depth} color pair")]
    UnsupportedLayout { packet_len: usize, color_depth: ColorDepth },

    /// A packet whose length does not match the active generation.
    #[error("bad packet length, expected {expected} bytes but got {actual}")]
    BadPacketLength { expected: usize, actual: usize },

    /// The controller never reported ready within the poll ceiling.
    #[error("controller not ready after {attempts} status polls, device may be in use")]
    ControllerUnreachable { attempts: u32 },

    /// The controller could not be opened.
    #[error(
        "unable to open device {vendor_id:04x}:{product_id:04x}: {source} \
         (root permissions may be required)"
    )]
    DeviceOpen { vendor_id: u16, product_id: u16, source: hidapi::HidError },

    /// A transport was used before it was acquired.
    #[error("transport used before acquire")]
    NotAcquired,

    /// Failure in a custom transport backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// HID backend failure.
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// A theme document could not be read.
    #[error("unable to read theme {path:?}: {source}")]
    ThemeRead { path: PathBuf, source: std::io::Error },

    /// A theme document could not be parsed.
    #[error("unable to parse theme {path:?}: {source}")]
    ThemeParse { path: PathBuf, source: serde_json::Error },
}

impl Error {
    /// Whether this error must abort the running operation.
    ///
    /// Exceeding the ready-poll ceiling is the only condition the session
    /// layer treats as fatal; everything else surfaces before any packet is
    /// written or is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ControllerUnreachable { .. })
    }
}
