//! Lighting zone registry and zone mask arithmetic.

use std::fmt::{self, Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

use clap::ValueEnum;

/// Independently addressable lighting region of the Alienware 13 R3.
#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Zone {
    LeftKeyboard,
    MiddleLeftKeyboard,
    MiddleRightKeyboard,
    RightKeyboard,
    AlienHead,
    AlienwareLogo,
    TouchPad,
    PowerButton,
}

impl Zone {
    /// Every known zone, in registry order.
    ///
    /// This order defines the order theme blocks are transmitted in and the
    /// order zone names are listed in diagnostics.
    pub const ALL: [Zone; 8] = [
        Zone::LeftKeyboard,
        Zone::MiddleLeftKeyboard,
        Zone::MiddleRightKeyboard,
        Zone::RightKeyboard,
        Zone::AlienHead,
        Zone::AlienwareLogo,
        Zone::TouchPad,
        Zone::PowerButton,
    ];

    /// Controller bitmask of this zone.
    pub const fn code(self) -> u32 {
        match self {
            Zone::LeftKeyboard => 0x0008,
            Zone::MiddleLeftKeyboard => 0x0004,
            Zone::MiddleRightKeyboard => 0x0002,
            Zone::RightKeyboard => 0x0001,
            Zone::AlienHead => 0x0020,
            Zone::AlienwareLogo => 0x0040,
            Zone::TouchPad => 0x0080,
            Zone::PowerButton => 0x0100,
        }
    }

    /// Zone name as spelled in theme documents.
    pub const fn name(self) -> &'static str {
        match self {
            Zone::LeftKeyboard => "LEFT_KEYBOARD",
            Zone::MiddleLeftKeyboard => "MIDDLE_LEFT_KEYBOARD",
            Zone::MiddleRightKeyboard => "MIDDLE_RIGHT_KEYBOARD",
            Zone::RightKeyboard => "RIGHT_KEYBOARD",
            Zone::AlienHead => "ALIEN_HEAD",
            Zone::AlienwareLogo => "ALIENWARE_LOGO",
            Zone::TouchPad => "TOUCH_PAD",
            Zone::PowerButton => "POWER_BUTTON",
        }
    }

    /// Look up a zone by its theme document name.
    pub fn from_name(name: &str) -> Option<Zone> {
        Zone::ALL.iter().copied().find(|zone| zone.name() == name)
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask addressing any set of zones at once.
///
/// The wire format reserves 24 bits for the zone field, of which the 13 R3
/// uses eight. Masks read back from the device may carry bits outside the
/// known zone set; these are preserved and reported as unknown rather than
/// silently dropped.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ZoneMask(u32);

impl ZoneMask {
    /// Mask selecting no zones.
    pub const EMPTY: ZoneMask = ZoneMask(0);

    /// Mask selecting every known zone.
    pub const fn all() -> ZoneMask {
        let mut mask = 0;
        let mut i = 0;
        while i < Zone::ALL.len() {
            mask |= Zone::ALL[i].code();
            i += 1;
        }
        ZoneMask(mask)
    }

    /// Mask from a raw wire value.
    pub const fn from_raw(raw: u32) -> ZoneMask {
        ZoneMask(raw)
    }

    /// Raw wire value of this mask.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, zone: Zone) -> bool {
        self.0 & zone.code() != 0
    }

    /// Split the mask into its known zones and the residual unknown bits.
    ///
    /// Zones come back in registry order. The residual is zero exactly when
    /// every set bit belongs to a known zone.
    pub fn split_known(self) -> (Vec<Zone>, u32) {
        let mut residual = self.0;
        let mut zones = Vec::new();
        for zone in Zone::ALL {
            if residual & zone.code() != 0 {
                zones.push(zone);
                residual &= !zone.code();
            }
        }
        (zones, residual)
    }
}

impl From<Zone> for ZoneMask {
    fn from(zone: Zone) -> ZoneMask {
        ZoneMask(zone.code())
    }
}

impl BitOr for Zone {
    type Output = ZoneMask;

    fn bitor(self, rhs: Zone) -> ZoneMask {
        ZoneMask(self.code() | rhs.code())
    }
}

impl BitOr<Zone> for ZoneMask {
    type Output = ZoneMask;

    fn bitor(self, rhs: Zone) -> ZoneMask {
        ZoneMask(self.0 | rhs.code())
    }
}

impl BitOr for ZoneMask {
    type Output = ZoneMask;

    fn bitor(self, rhs: ZoneMask) -> ZoneMask {
        ZoneMask(self.0 | rhs.0)
    }
}

impl BitOrAssign<Zone> for ZoneMask {
    fn bitor_assign(&mut self, rhs: Zone) {
        self.0 |= rhs.code();
    }
}

impl FromIterator<Zone> for ZoneMask {
    fn from_iter<I: IntoIterator<Item = Zone>>(iter: I) -> ZoneMask {
        let mut mask = ZoneMask::EMPTY;
        for zone in iter {
            mask |= zone;
        }
        mask
    }
}

/// Comma-separated zone names, with unknown bits rendered as
/// `UNKNOWN_ZONE_CODE(0x..)`.
impl Display for ZoneMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (zones, residual) = self.split_known();
        let mut first = true;
        for zone in zones {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(zone.name())?;
            first = false;
        }
        if residual != 0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "UNKNOWN_ZONE_CODE({residual:#x})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_bits() {
        for zone in Zone::ALL {
            assert_eq!(zone.code().count_ones(), 1, "{zone} code is not a single bit");
        }
        assert_eq!(ZoneMask::all().raw().count_ones(), Zone::ALL.len() as u32);
    }

    #[test]
    fn name_lookup_roundtrips() {
        for zone in Zone::ALL {
            assert_eq!(Zone::from_name(zone.name()), Some(zone));
        }
        assert_eq!(Zone::from_name("HYPERSPACE_DRIVE"), None);
    }

    #[test]
    fn masks_combine() {
        let mask = Zone::LeftKeyboard | Zone::AlienHead;
        assert_eq!(mask.raw(), 0x0028);
        assert!(mask.contains(Zone::AlienHead));
        assert!(!mask.contains(Zone::TouchPad));
        assert!(!mask.is_empty());
        assert!(ZoneMask::EMPTY.is_empty());

        let mut mask = ZoneMask::EMPTY;
        mask |= Zone::PowerButton;
        assert_eq!(mask.raw(), 0x0100);

        let collected: ZoneMask = Zone::ALL.into_iter().collect();
        assert_eq!(collected, ZoneMask::all());
    }

    #[test]
    fn split_known_reports_residual() {
        let (zones, residual) = ZoneMask::from_raw(0x0028).split_known();
        assert_eq!(zones, vec![Zone::LeftKeyboard, Zone::AlienHead]);
        assert_eq!(residual, 0);

        let (zones, residual) = ZoneMask::from_raw(0xf0_0028).split_known();
        assert_eq!(zones, vec![Zone::LeftKeyboard, Zone::AlienHead]);
        assert_eq!(residual, 0xf0_0000);
    }

    #[test]
    fn display_names_unknown_bits() {
        let mask = ZoneMask::from_raw(Zone::AlienHead.code() | 0x40_0000);
        assert_eq!(mask.to_string(), "ALIEN_HEAD, UNKNOWN_ZONE_CODE(0x400000)");
        assert_eq!(ZoneMask::EMPTY.to_string(), "");
    }
}
