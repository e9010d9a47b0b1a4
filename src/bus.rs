use embedded_hal::delay::DelayNs;

use crate::{sequence::InitSequence, DisplayError};

/// The transport that delivers commands and their parameters to a display controller,
/// e.g. a four-wire SPI or 8080 parallel bus driver. Implementations own the bus framing;
/// this crate only decides what is sent and in which order.
pub trait BusSink {
    type Error: core::fmt::Debug;

    /// Send one command byte followed by its parameter bytes.
    fn send_command(&mut self, opcode: u8, params: &[u8]) -> Result<(), Self::Error>;
}

impl<T> BusSink for &mut T
where
    T: BusSink + ?Sized,
{
    type Error = T::Error;

    fn send_command(&mut self, opcode: u8, params: &[u8]) -> Result<(), Self::Error> {
        T::send_command(self, opcode, params)
    }
}

/// Send every command of `sequence` to `bus` in order, sleeping after each command that
/// carries a delay. The first bus failure aborts the remaining commands and is returned;
/// nothing is retried since the controller state is unknown at that point.
pub fn replay<BUS, DELAY>(
    sequence: &InitSequence<'_>,
    bus: &mut BUS,
    delay: &mut DELAY,
) -> Result<(), DisplayError<BUS::Error>>
where
    BUS: BusSink,
    DELAY: DelayNs,
{
    #[cfg(feature = "defmt")]
    defmt::debug!("Replaying init sequence of {} commands", sequence.len());
    for command in sequence {
        bus.send_command(command.opcode(), command.parameters())
            .map_err(DisplayError::BusWrite)?;
        if let Some(delay_ms) = command.delay_ms() {
            delay.delay_ms(u32::from(delay_ms));
        }
    }
    Ok(())
}
