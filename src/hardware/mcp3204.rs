//! Microchip MCP3204 4-channel 12-bit ADC on the Raspberry Pi SPI controller.
//!
//! One conversion is a single 3-byte full-duplex transfer:
//!
//! ```text
//! MOSI: 0000 01 SGL D2 | D1 D0 xx xxxx | xxxx xxxx
//! MISO: ???? ???? ???? | ??? 0 B11..B8 | B7 ... B0
//! ```
//!
//! The zero bit just before B11 is the converter's null bit. If it reads back
//! as one, nothing on the other side of the bus is driving MISO and the frame
//! is discarded.
//!
//! The framing helpers are pure and always compiled; the [`Mcp3204`] device
//! itself needs the `hardware_spi` feature.

use crate::error::BusError;
use std::io;

/// Number of single-ended inputs on the MCP3204.
pub const CHANNELS: u8 = 4;

const START_SINGLE_ENDED: u8 = 0b0000_0110;
const NULL_BIT: u8 = 0b0001_0000;

/// Build the request frame for a single-ended conversion on `channel`.
pub fn request_frame(channel: u8) -> Result<[u8; 3], BusError> {
    if channel >= CHANNELS {
        return Err(BusError::decode(
            channel,
            format!("MCP3204 has {CHANNELS} channels"),
        ));
    }
    // D2 is always zero on the 4-channel part.
    Ok([START_SINGLE_ENDED, (channel & 0b11) << 6, 0])
}

/// Extract the 12-bit code from the response frame.
pub fn decode_frame(channel: u8, rx: &[u8; 3]) -> Result<u16, BusError> {
    if rx[1] & NULL_BIT != 0 {
        return Err(BusError::decode(channel, "null bit not driven low"));
    }
    Ok((u16::from(rx[1] & 0x0F) << 8) | u16::from(rx[2]))
}

/// Sort an I/O failure from the SPI device into transient or fatal.
///
/// Missing device nodes, denied access and vanished devices mean the bus is
/// gone for good; everything else is retried on the next tick.
pub fn classify_io(context: &str, error: &io::Error) -> BusError {
    const ENXIO: i32 = 6;
    const ENODEV: i32 = 19;

    let gone = matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied | io::ErrorKind::BrokenPipe
    ) || matches!(error.raw_os_error(), Some(ENXIO) | Some(ENODEV));

    if gone {
        BusError::Disconnected(format!("{context}: {error}"))
    } else {
        BusError::Transient(format!("{context}: {error}"))
    }
}

#[cfg(feature = "hardware_spi")]
pub use device::Mcp3204;

#[cfg(feature = "hardware_spi")]
mod device {
    use super::{classify_io, decode_frame, request_frame};
    use crate::core::AdcBus;
    use crate::error::BusError;
    use rppal::spi::{self, Bus, Mode, SlaveSelect, Spi};
    use tracing::{debug, info};

    fn bus_from_index(index: u8) -> Result<Bus, BusError> {
        Ok(match index {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            other => return Err(BusError::Disconnected(format!("no SPI bus {other}"))),
        })
    }

    fn slave_select_from_index(index: u8) -> Result<SlaveSelect, BusError> {
        Ok(match index {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(BusError::Disconnected(format!(
                    "unsupported slave select {other}"
                )))
            }
        })
    }

    fn map_spi_error(context: &str, error: spi::Error) -> BusError {
        match error {
            spi::Error::Io(e) => classify_io(context, &e),
            // Unsupported clock/mode settings never fix themselves.
            other => BusError::Disconnected(format!("{context}: {other}")),
        }
    }

    /// MCP3204 behind `/dev/spidev{bus}.{slave_select}`.
    pub struct Mcp3204 {
        bus: u8,
        slave_select: u8,
        clock_hz: u32,
        spi: Option<Spi>,
    }

    impl Mcp3204 {
        /// Describe the device; nothing is opened until [`AdcBus::open`].
        pub fn new(bus: u8, slave_select: u8, clock_hz: u32) -> Self {
            Self {
                bus,
                slave_select,
                clock_hz,
                spi: None,
            }
        }
    }

    impl AdcBus for Mcp3204 {
        fn name(&self) -> String {
            format!("MCP3204 on spidev{}.{}", self.bus, self.slave_select)
        }

        fn open(&mut self) -> Result<(), BusError> {
            if self.spi.is_some() {
                return Ok(());
            }
            let spi = Spi::new(
                bus_from_index(self.bus)?,
                slave_select_from_index(self.slave_select)?,
                self.clock_hz,
                Mode::Mode0,
            )
            .map_err(|e| map_spi_error("open SPI device", e))?;

            info!(
                bus = self.bus,
                slave_select = self.slave_select,
                clock_hz = self.clock_hz,
                "Opened MCP3204"
            );
            self.spi = Some(spi);
            Ok(())
        }

        fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
            let spi = self
                .spi
                .as_mut()
                .ok_or_else(|| BusError::Disconnected("MCP3204 is not open".to_string()))?;

            let tx = request_frame(channel)?;
            let mut rx = [0u8; 3];
            let transferred = spi
                .transfer(&mut rx, &tx)
                .map_err(|e| map_spi_error("SPI transfer", e))?;
            if transferred != tx.len() {
                return Err(BusError::Transient(format!(
                    "short SPI transfer: {transferred} of {} bytes",
                    tx.len()
                )));
            }

            let code = decode_frame(channel, &rx)?;
            debug!(channel, code, "MCP3204 conversion");
            Ok(code)
        }

        fn close(&mut self) -> Result<(), BusError> {
            // Dropping the handle closes the spidev file descriptor.
            if self.spi.take().is_some() {
                info!(bus = self.bus, slave_select = self.slave_select, "Closed MCP3204");
            }
            Ok(())
        }
    }
}
