//! Logical controller commands shared by the codec, theme compiler, and
//! session layer.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use clap::ValueEnum;

use crate::zone::ZoneMask;
use crate::{Error, Result};

/// Lowest tempo the controller animates reliably, in milliseconds.
///
/// Below this the device stutters or ignores the value, so lower tempos are
/// rejected outright instead of clamped.
pub const MIN_TEMPO: u16 = 50;

/// Tempo used when a theme or caller does not specify one, in milliseconds.
pub const DEFAULT_TEMPO: u16 = 200;

/// RGB color.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    /// Build a color from untrusted channel values.
    ///
    /// Channels outside the 8-bit range are rejected, never clamped.
    pub fn from_channels(r: i64, g: i64, b: i64) -> Result<Rgb> {
        let channel =
            |value: i64| u8::try_from(value).map_err(|_| Error::InvalidColorChannel(value));
        Ok(Rgb { r: channel(r)?, g: channel(g)?, b: channel(b)? })
    }

    /// A fresh random color.
    pub fn random() -> Rgb {
        Rgb { r: rand::random(), g: rand::random(), b: rand::random() }
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Parse colors in the format `0xRRGGBB`.
    fn from_str(s: &str) -> Result<Rgb> {
        let invalid = || Error::InvalidColorFormat(s.into());

        if s.len() != 8 || !s.is_ascii() || !s.starts_with("0x") {
            return Err(invalid());
        }

        let r = u8::from_str_radix(&s[2..4], 16).map_err(|_| invalid())?;
        let g = u8::from_str_radix(&s[4..6], 16).map_err(|_| invalid())?;
        let b = u8::from_str_radix(&s[6..8], 16).map_err(|_| invalid())?;

        Ok(Rgb { r, g, b })
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Baseline a reset command puts every zone into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResetKind {
    AllLightsOff,
    AllLightsOn,
}

impl ResetKind {
    /// Wire code of this reset kind.
    pub const fn code(self) -> u8 {
        match self {
            ResetKind::AllLightsOff => 3,
            ResetKind::AllLightsOn => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<ResetKind> {
        match code {
            3 => Some(ResetKind::AllLightsOff),
            4 => Some(ResetKind::AllLightsOn),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ResetKind::AllLightsOff => "ALL_LIGHTS_OFF",
            ResetKind::AllLightsOn => "ALL_LIGHTS_ON",
        }
    }
}

/// Power state a saved animation block can be bound to.
///
/// The controller keeps one block per power state in non-volatile storage and
/// replays it without host involvement.
#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerState {
    Boot,
    AcSleep,
    AcCharged,
    AcCharging,
    BatterySleep,
    BatteryOn,
    BatteryCritical,
}

impl PowerState {
    /// Wire code of this power state.
    pub const fn code(self) -> u8 {
        match self {
            PowerState::Boot => 1,
            PowerState::AcSleep => 2,
            PowerState::AcCharged => 5,
            PowerState::AcCharging => 6,
            PowerState::BatterySleep => 7,
            PowerState::BatteryOn => 8,
            PowerState::BatteryCritical => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<PowerState> {
        match code {
            1 => Some(PowerState::Boot),
            2 => Some(PowerState::AcSleep),
            5 => Some(PowerState::AcCharged),
            6 => Some(PowerState::AcCharging),
            7 => Some(PowerState::BatterySleep),
            8 => Some(PowerState::BatteryOn),
            9 => Some(PowerState::BatteryCritical),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PowerState::Boot => "BOOT",
            PowerState::AcSleep => "AC_SLEEP",
            PowerState::AcCharged => "AC_CHARGED",
            PowerState::AcCharging => "AC_CHARGING",
            PowerState::BatterySleep => "BATTERY_SLEEP",
            PowerState::BatteryOn => "BATTERY_ON",
            PowerState::BatteryCritical => "BATTERY_CRITICAL",
        }
    }
}

/// One logical controller command.
///
/// [`crate::packet::Generation`] turns these into wire packets. Color and
/// blink/morph steps carry a sequence id grouping them into one animation
/// block per zone; the remaining commands steer the controller itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fade the masked zones between two colors.
    MorphColor { sequence: u8, zones: ZoneMask, start: Rgb, end: Rgb },
    /// Blink the masked zones in one color.
    BlinkColor { sequence: u8, zones: ZoneMask, color: Rgb },
    /// Hold one color on the masked zones.
    SetColor { sequence: u8, zones: ZoneMask, color: Rgb },
    /// Close the current animation block so it repeats.
    LoopSequence,
    /// Commit and run everything sent since the last reset.
    Execute,
    /// Ask the controller for its status byte.
    GetStatus,
    /// Drop all pending state and force every zone to a baseline.
    Reset(ResetKind),
    /// Bind the block that follows to a power state.
    SaveNext(PowerState),
    /// Persist the bound block to non-volatile storage.
    Save,
    /// Set the blink/morph speed in milliseconds.
    SetTempo(u16),
}

impl Command {
    /// Wire command code.
    pub const fn code(&self) -> u8 {
        match self {
            Command::MorphColor { .. } => 0x1,
            Command::BlinkColor { .. } => 0x2,
            Command::SetColor { .. } => 0x3,
            Command::LoopSequence => 0x4,
            Command::Execute => 0x5,
            Command::GetStatus => 0x6,
            Command::Reset(_) => 0x7,
            Command::SaveNext(_) => 0x8,
            Command::Save => 0x9,
            Command::SetTempo(_) => 0xe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_validation_rejects_out_of_range() {
        assert_eq!(Rgb::from_channels(255, 0, 16).unwrap(), Rgb::new(255, 0, 16));
        assert!(matches!(
            Rgb::from_channels(256, 0, 0),
            Err(Error::InvalidColorChannel(256))
        ));
        assert!(matches!(
            Rgb::from_channels(0, -1, 0),
            Err(Error::InvalidColorChannel(-1))
        ));
    }

    #[test]
    fn color_parsing() {
        assert_eq!(Rgb::from_str("0xff00aa").unwrap(), Rgb::new(0xff, 0x00, 0xaa));
        assert!(Rgb::from_str("ff00aa").is_err());
        assert!(Rgb::from_str("0xff00").is_err());
        assert!(Rgb::from_str("0xgg0000").is_err());
        assert!(Rgb::from_str("0xff€0").is_err());
        assert_eq!(Rgb::new(0xff, 0x00, 0xaa).to_string(), "0xff00aa");
    }

    #[test]
    fn reset_and_power_codes_roundtrip() {
        for kind in [ResetKind::AllLightsOff, ResetKind::AllLightsOn] {
            assert_eq!(ResetKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ResetKind::from_code(0), None);

        for state in [
            PowerState::Boot,
            PowerState::AcSleep,
            PowerState::AcCharged,
            PowerState::AcCharging,
            PowerState::BatterySleep,
            PowerState::BatteryOn,
            PowerState::BatteryCritical,
        ] {
            assert_eq!(PowerState::from_code(state.code()), Some(state));
        }
        assert_eq!(PowerState::from_code(3), None);
    }
}
