//! Theme documents and their compilation into controller commands.
//!
//! Themes are JSON documents mapping zone names to effect sequences:
//!
//! ```json
//! {
//!     "DESCRIPTION": "Red head, morphing touchpad",
//!     "TEMPO": 200,
//!     "ZONES": {
//!         "ALIEN_HEAD": [{ "EFFECT": "SET_COLOR", "COLOR": [255, 0, 0] }],
//!         "TOUCH_PAD": [{
//!             "EFFECT": "MORPH_COLOR",
//!             "COLOR1": [0, 255, 0],
//!             "COLOR2": [0, 0, 255]
//!         }]
//!     }
//! }
//! ```
//!
//! A zone key may name several zones joined by `|`, which all receive the
//! same effect sequence. Compilation validates the document and lowers it to
//! the ordered command list the session transmits.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::command::{Command, Rgb, DEFAULT_TEMPO, MIN_TEMPO};
use crate::zone::{Zone, ZoneMask};
use crate::{Error, Result};

/// Display duration used when a theme does not specify one, in milliseconds.
pub const DEFAULT_DURATION: u64 = 10_000;

/// Zone-native lighting effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hold one color.
    Set(Rgb),
    /// Blink in one color.
    Blink(Rgb),
    /// Fade between two colors.
    Morph(Rgb, Rgb),
    /// Explicit end-of-block marker.
    Loop,
}

impl Effect {
    /// Lower this effect into the command for one animation block.
    pub fn to_command(self, sequence: u8, zones: ZoneMask) -> Command {
        match self {
            Effect::Set(color) => Command::SetColor { sequence, zones, color },
            Effect::Blink(color) => Command::BlinkColor { sequence, zones, color },
            Effect::Morph(start, end) => Command::MorphColor { sequence, zones, start, end },
            Effect::Loop => Command::LoopSequence,
        }
    }
}

/// On-disk theme document.
///
/// Zone groups are kept sorted by key so compilation is deterministic when a
/// zone appears in more than one group.
#[derive(Debug, Default, Deserialize)]
pub struct ThemeFile {
    #[serde(default, rename = "DESCRIPTION")]
    pub description: String,
    #[serde(rename = "TEMPO")]
    pub tempo: Option<i64>,
    #[serde(rename = "DURATION")]
    pub duration: Option<i64>,
    #[serde(default, rename = "ZONES")]
    pub zones: BTreeMap<String, Vec<EffectEntry>>,
}

/// One entry of a zone's effect sequence.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EffectEntry {
    #[serde(default, rename = "EFFECT")]
    pub effect: String,
    #[serde(rename = "COLOR")]
    pub color: Option<[i64; 3]>,
    #[serde(rename = "COLOR1")]
    pub color1: Option<[i64; 3]>,
    #[serde(rename = "COLOR2")]
    pub color2: Option<[i64; 3]>,
}

impl ThemeFile {
    /// Read and parse a theme document.
    pub fn load(path: impl AsRef<Path>) -> Result<ThemeFile> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| Error::ThemeRead { path: path.to_owned(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| Error::ThemeParse { path: path.to_owned(), source })
    }

    /// Validate the document and lower it into the ordered command list.
    ///
    /// The list starts with the tempo, followed by one block per zone in
    /// registry order. Blocks not ending in an explicit loop marker get one
    /// appended so the animation repeats. Execute is left to the session, so
    /// a compiled theme can also be saved instead of run.
    pub fn compile(&self) -> Result<CompiledTheme> {
        let tempo = validate_tempo(self.tempo.unwrap_or(i64::from(DEFAULT_TEMPO)))?;
        // Duration is advisory metadata and never transmitted, so junk values
        // fall back to the default instead of failing the theme.
        let duration = self
            .duration
            .and_then(|duration| u64::try_from(duration).ok())
            .unwrap_or(DEFAULT_DURATION);

        let mut expanded: BTreeMap<&str, &[EffectEntry]> = BTreeMap::new();
        for (joined, entries) in &self.zones {
            for name in joined.split('|') {
                if Zone::from_name(name).is_some() {
                    expanded.insert(name, entries);
                } else {
                    warn!("theme names unknown zone {:?}, skipping it", name);
                }
            }
        }

        let mut commands = vec![Command::SetTempo(tempo)];
        let mut sequence = 0;
        for zone in Zone::ALL {
            let entries = match expanded.get(zone.name()) {
                Some(entries) => entries,
                None => continue,
            };

            let effects = validate_sequence(entries)?;
            if effects.is_empty() {
                continue;
            }

            for effect in &effects {
                commands.push(effect.to_command(sequence, zone.into()));
            }
            if !matches!(effects.last(), Some(Effect::Loop)) {
                commands.push(Command::LoopSequence);
            }
            sequence += 1;
        }

        debug!(
            "compiled theme {:?}: tempo {} ms, duration {} ms, {} commands",
            self.description,
            tempo,
            duration,
            commands.len()
        );

        Ok(CompiledTheme {
            description: self.description.clone(),
            tempo,
            duration,
            commands,
        })
    }
}

fn validate_tempo(millis: i64) -> Result<u16> {
    match u16::try_from(millis) {
        Ok(tempo) if tempo >= MIN_TEMPO => Ok(tempo),
        _ => Err(Error::InvalidTempo(millis)),
    }
}

/// Validate one zone's effect sequence.
///
/// Entries with an unrecognized effect name are dropped. Missing colors are
/// filled in with random ones, out-of-range channels fail the theme.
fn validate_sequence(entries: &[EffectEntry]) -> Result<Vec<Effect>> {
    let mut effects = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.effect.as_str() {
            "SET_COLOR" => effects.push(Effect::Set(entry_color(entry.color)?)),
            "BLINK_COLOR" => effects.push(Effect::Blink(entry_color(entry.color)?)),
            "MORPH_COLOR" => effects.push(Effect::Morph(
                entry_color(entry.color1)?,
                entry_color(entry.color2)?,
            )),
            "LOOP_SEQUENCE" => effects.push(Effect::Loop),
            other => debug!("dropping entry with unrecognized effect {:?}", other),
        }
    }
    Ok(effects)
}

fn entry_color(channels: Option<[i64; 3]>) -> Result<Rgb> {
    match channels {
        Some([r, g, b]) => Rgb::from_channels(r, g, b),
        None => Ok(Rgb::random()),
    }
}

/// A theme lowered to controller commands.
#[derive(Debug, Clone)]
pub struct CompiledTheme {
    pub description: String,
    /// Blink/morph speed the blocks run at, in milliseconds.
    pub tempo: u16,
    /// Suggested display time before switching themes, in milliseconds.
    /// Advisory only, never transmitted.
    pub duration: u64,
    /// Tempo followed by the per-zone blocks. Execute is appended at
    /// transmit time.
    pub commands: Vec<Command>,
}

impl CompiledTheme {
    /// Whether no zone produced any commands.
    ///
    /// Transmitting such a theme would only set a tempo and execute nothing,
    /// so callers skip the device entirely.
    pub fn is_semantically_empty(&self) -> bool {
        self.commands.len() <= 1
    }
}
