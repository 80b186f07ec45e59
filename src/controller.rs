//! Controller session layer.
//!
//! The controller is stateful: commands only take effect in the right order,
//! and it answers status polls with ready/busy while chewing on previous
//! input. Every operation therefore runs as one session over the same
//! sequence:
//!
//! 1. acquire the device,
//! 2. reset to a baseline,
//! 3. poll until ready,
//! 4. transmit the command batch plus an execute,
//! 5. poll until ready,
//! 6. release the device.
//!
//! Commands are encoded and validated before the device is acquired, so an
//! invalid batch never leaves a half-programmed controller behind.

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::command::{Command, PowerState, ResetKind};
use crate::packet::{Generation, Status};
use crate::theme::{CompiledTheme, Effect};
use crate::transport::Transport;
use crate::zone::ZoneMask;
use crate::{Error, Result};

/// Status polls attempted before declaring the controller unreachable.
pub const READY_POLL_LIMIT: u32 = 50;

/// Sequence id used by the one-shot paths; themes assign their own ids.
const ONE_SHOT_SEQUENCE: u8 = 1;

/// A lighting controller reachable over some transport.
pub struct Controller<T> {
    transport: T,
    generation: Generation,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: T, generation: Generation) -> Controller<T> {
        Controller { transport, generation }
    }

    /// Acquire the device for a sequence of exchanges.
    ///
    /// The device is released when the returned session drops, on every exit
    /// path.
    pub fn session(&mut self) -> Result<Session<'_, T>> {
        self.transport.acquire()?;
        Ok(Session { controller: self })
    }

    /// Run a compiled theme on the controller.
    ///
    /// Semantically empty themes skip the device entirely, the controller
    /// keeps showing whatever it was showing.
    pub fn apply(&mut self, theme: &CompiledTheme) -> Result<()> {
        if theme.is_semantically_empty() {
            debug!("theme {:?} is semantically empty, nothing to apply", theme.description);
            return Ok(());
        }

        let mut packets = Vec::with_capacity(theme.commands.len() + 1);
        for command in &theme.commands {
            packets.push(self.generation.encode(command)?);
        }
        packets.push(self.generation.encode(&Command::Execute)?);

        self.run_batch(&packets)?;
        debug!("theme {:?} applied at tempo {} ms", theme.description, theme.tempo);

        Ok(())
    }

    /// Run a single effect block on the given zones.
    ///
    /// An empty zone mask skips the device entirely. With `save_for` set, the
    /// block is additionally persisted for that power state, so the
    /// controller replays it without host involvement.
    pub fn set_zones(
        &mut self,
        zones: ZoneMask,
        effect: Effect,
        tempo: u16,
        save_for: Option<PowerState>,
    ) -> Result<()> {
        if zones.is_empty() {
            debug!("empty zone mask, nothing to set");
            return Ok(());
        }

        let mut commands = Vec::with_capacity(6);
        if let Some(state) = save_for {
            commands.push(Command::SaveNext(state));
        }
        commands.push(Command::SetTempo(tempo));
        commands.push(effect.to_command(ONE_SHOT_SEQUENCE, zones));
        if !matches!(effect, Effect::Loop) {
            commands.push(Command::LoopSequence);
        }
        if save_for.is_some() {
            commands.push(Command::Save);
        }
        commands.push(Command::Execute);

        let mut packets = Vec::with_capacity(commands.len());
        for command in &commands {
            packets.push(self.generation.encode(command)?);
        }

        self.run_batch(&packets)
    }

    /// Reset every zone to off and leave it there.
    pub fn all_lights_off(&mut self) -> Result<()> {
        self.reset_to(ResetKind::AllLightsOff)
    }

    /// Reset every zone to its power-on baseline.
    pub fn all_lights_on(&mut self) -> Result<()> {
        self.reset_to(ResetKind::AllLightsOn)
    }

    /// Poll the controller once, true when it reports ready.
    pub fn status(&mut self) -> Result<bool> {
        let mut session = self.session()?;
        session.get_status()
    }

    fn run_batch(&mut self, packets: &[Bytes]) -> Result<()> {
        let mut session = self.session()?;
        session.reset(ResetKind::AllLightsOn)?;
        session.wait_until_ready()?;
        session.send_packets(packets);
        session.wait_until_ready()
    }

    fn reset_to(&mut self, kind: ResetKind) -> Result<()> {
        let mut session = self.session()?;
        session.reset(kind)?;
        session.wait_until_ready()
    }
}

/// Exclusive device session.
///
/// Holds the transport acquired; dropping it releases the device exactly
/// once, also when an operation bails out early.
pub struct Session<'a, T: Transport> {
    controller: &'a mut Controller<T>,
}

impl<T: Transport> Session<'_, T> {
    /// Poll the controller status once.
    ///
    /// Missing, truncated or unparseable responses count as not ready rather
    /// than an error; only the write of the poll itself can fail.
    pub fn get_status(&mut self) -> Result<bool> {
        let packet = self.controller.generation.encode(&Command::GetStatus)?;
        self.write_packet(&packet)?;

        match self.controller.transport.read_packet() {
            Ok(response) => match response.first().map(|&byte| Status::from_byte(byte)) {
                Some(status) => {
                    debug!("pinged, controller status: {:?}", status);
                    Ok(status.is_ready())
                },
                None => {
                    debug!("pinged, no response");
                    Ok(false)
                },
            },
            Err(err) => {
                debug!("pinged, status read failed: {}", err);
                Ok(false)
            },
        }
    }

    /// Poll until the controller reports ready.
    ///
    /// Every non-ready outcome counts against the ceiling, busy responses
    /// and transport hiccups alike, so a wedged or contended device cannot
    /// stall the session forever.
    pub fn wait_until_ready(&mut self) -> Result<()> {
        for attempt in 1..=READY_POLL_LIMIT {
            match self.get_status() {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    debug!("controller not ready, attempt {}/{}", attempt, READY_POLL_LIMIT)
                },
                Err(err) => {
                    debug!(
                        "status poll failed: {}, attempt {}/{}",
                        err, attempt, READY_POLL_LIMIT
                    )
                },
            }
        }

        error!("controller did not report ready, is the device already in use?");
        Err(Error::ControllerUnreachable { attempts: READY_POLL_LIMIT })
    }

    /// Transmit a reset, dropping all pending controller state.
    pub fn reset(&mut self, kind: ResetKind) -> Result<()> {
        let packet = self.controller.generation.encode(&Command::Reset(kind))?;
        self.write_packet(&packet)
    }

    /// Transmit packets strictly in order.
    ///
    /// An individual write failure is logged and skipped so one glitch does
    /// not abandon the remaining batch mid-animation.
    pub fn send_packets(&mut self, packets: &[Bytes]) {
        for packet in packets {
            if let Err(err) = self.write_packet(packet) {
                warn!("packet write failed: {}", err);
            }
        }
    }

    fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        debug!("writing packet: {:02x?}", packet);
        if let Ok(decoded) = self.controller.generation.decode(packet) {
            debug!("payload: {}", decoded);
        }

        self.controller.transport.write_packet(packet)?;
        Ok(())
    }
}

impl<T: Transport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.controller.transport.release() {
            warn!("transport release failed: {}", err);
        }
    }
}
