//! Device transport, the byte pipe the session layer talks through.

use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::{Error, Result};

/// How long a read waits for a response before reporting an empty packet, in
/// milliseconds.
const READ_TIMEOUT_MS: i32 = 200;

/// Blocking packet transport to a lighting controller.
///
/// The session layer owns command sequencing; implementations only move
/// packets and track whether the device is held.
pub trait Transport {
    /// Take exclusive ownership of the device. A no-op when already held.
    fn acquire(&mut self) -> Result<()>;

    /// Give ownership back. A no-op when not held.
    fn release(&mut self) -> Result<()>;

    /// Write one command packet, returning the number of bytes written.
    fn write_packet(&mut self, packet: &[u8]) -> Result<usize>;

    /// Read one response packet.
    ///
    /// May return fewer bytes than a full packet, or none at all, when the
    /// controller has nothing to say within the read timeout.
    fn read_packet(&mut self) -> Result<Vec<u8>>;
}

/// hidapi-backed transport.
///
/// Command packets already start with the `0x02` report ID, so a plain write
/// issues the `SET_REPORT` control transfer the controller expects.
pub struct HidTransport {
    vendor_id: u16,
    product_id: u16,
    packet_len: usize,
    device: Option<HidDevice>,
}

impl HidTransport {
    /// Transport for the device at `vendor_id:product_id`, reading responses
    /// of up to `packet_len` bytes.
    ///
    /// The device is not opened until [`Transport::acquire`].
    pub fn new(vendor_id: u16, product_id: u16, packet_len: usize) -> HidTransport {
        HidTransport { vendor_id, product_id, packet_len, device: None }
    }
}

impl Transport for HidTransport {
    fn acquire(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let api = HidApi::new()?;
        let device = api.open(self.vendor_id, self.product_id).map_err(|source| {
            Error::DeviceOpen {
                vendor_id: self.vendor_id,
                product_id: self.product_id,
                source,
            }
        })?;

        debug!("acquired device {:04x}:{:04x}", self.vendor_id, self.product_id);
        self.device = Some(device);

        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.device.take().is_some() {
            debug!("released device {:04x}:{:04x}", self.vendor_id, self.product_id);
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &[u8]) -> Result<usize> {
        let device = self.device.as_ref().ok_or(Error::NotAcquired)?;
        Ok(device.write(packet)?)
    }

    fn read_packet(&mut self) -> Result<Vec<u8>> {
        let device = self.device.as_ref().ok_or(Error::NotAcquired)?;

        let mut response = vec![0; self.packet_len];
        let len = device.read_timeout(&mut response, READ_TIMEOUT_MS)?;
        response.truncate(len);

        Ok(response)
    }
}
