//! This Rust `embedded-hal`-based library decodes the compact, bitpacked initialization sequences used to
//! configure TFT and OLED display controllers (ILI9341, ST7789, ST7735 and similar) and replays them over a display
//! bus in an embedded, `no_std` environment. No allocator is required: a decoded sequence borrows the bytes it was
//! decoded from.
//!
//! Every command in a sequence begins with a command byte followed by a byte giving the parameter count and whether
//! a delay is needed afterwards. When the top bit of the second byte is set, the byte after the parameters is the
//! delay in milliseconds. The remaining 7 bits are the parameter count, excluding any delay byte. Here is a portion
//! of an ILI9341 init sequence:
//! ```text
//! e1 0f 00 0e 14 03 11 07 31 c1 48 08 0f 0c 31 36 0f   set gamma, 15 parameters
//! 11 80 78                                              exit sleep, then wait 120 ms
//! 29 80 78                                              display on, then wait 120 ms
//! ```
//! The sequence should leave the display's memory access in line with its scan to minimize tearing.
//!
//! Key features include:
//! - Single-pass validation of a whole sequence before any bus activity
//! - Strictly ordered replay with the exact delays of the sequence
//! - Re-encoding of decoded or hand-built commands back to the bitpacked format
//! - A `Display` object with rotation, address window, vertical scroll and backlight control
//! - A bounded `Displays` collection that owns live displays until they are released
//! - Optional support for the `defmt` and `ufmt` logging frameworks
//!
//! ## Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! display-init-sequence = { version = "0.1", features = ["defmt"] }
//! ```
//! The `features = ["defmt"]` line is optional and enables the `defmt` feature, which allows the library's errors
//! to be used with the `defmt` logging framework and turns on debug logging. Another optional feature is
//! `features = ["ufmt"]`, which implements `ufmt::uDisplay` for the library's errors.
//!
//! Implement `BusSink` for your display bus, then decode the sequence and create the display:
//! ```rust
//! use display_init_sequence::{BusSink, Display, DisplayConfig, InitSequence, Rotation};
//!
//! const INIT_SEQUENCE: &[u8] = &[
//!     0xe1, 0x0f, 0x00, 0x0e, 0x14, 0x03, 0x11, 0x07, 0x31, 0xc1, 0x48, 0x08, 0x0f, 0x0c, 0x31, 0x36, 0x0f,
//!     0x11, 0x80, 0x78,
//!     0x29, 0x80, 0x78,
//! ];
//!
//! // board setup
//! let bus = ...; // BusSink implementation
//! let delay = ...; // DelayNs implementation
//!
//! let sequence = InitSequence::decode(INIT_SEQUENCE)?;
//! let config = DisplayConfig::new(320, 240).with_rotation(Rotation::from_degrees(90)?);
//! let mut display = Display::new(bus, sequence, config, delay);
//! ```
//! Decoding fails with `TruncatedSequenceError` before the bus is touched when a command runs past the end of the
//! buffer. Initialize the display:
//! ```rust
//! if let Err(e) = display.init() {
//!    panic!("Error initializing display: {}", e);
//! }
//! ```
//! A bus failure during `init` aborts the rest of the sequence. The display is then in an unknown state; reset
//! the controller and call `init` again to replay the whole sequence.
//!
//! The display methods return a `Result` that wraps the display object in `Ok()`, allowing for chaining:
//! ```rust
//! display.set_address_window(0, 0, 9, 9)?.begin_ram_write()?;
//! ```
//!
//! ### Keeping displays alive
//! Displays that must outlive the code that created them can be handed to a `Displays` collection. The collection
//! holds at most `N` displays and returns a display in `Err` when full. `release_displays` gives all of them back so
//! their buses and pins can be reused.
//!
#![no_std]

mod bit_configurations;
pub mod bus;
pub mod display;
pub mod registry;
pub mod sequence;

pub use bus::{replay, BusSink};
pub use display::{Display, DisplayConfig, NoBacklight, Rotation, UnsupportedRotationError};
pub use registry::{Displays, DEFAULT_DISPLAY_LIMIT};
pub use sequence::{
    encode_commands, Command, Commands, EncodeError, InitSequence, TruncatedSequenceError,
};

#[derive(Debug, PartialEq, Copy, Clone)]
/// Errors that can occur when initializing or driving a display. `E` is the error type of the display bus.
pub enum DisplayError<E> {
    /// Error returned from the display bus while sending a command
    BusWrite(E),
    /// The init sequence ended in the middle of a command
    TruncatedSequence(TruncatedSequenceError),
    /// Rotation is not a multiple of 90 degrees
    UnsupportedRotation(UnsupportedRotationError),
    /// The display has no adjustable backlight
    BrightnessNotAdjustable,
    /// The backlight pin could not be set
    BacklightPinError,
    /// Column is out of range
    ColumnOutOfRange,
    /// Row is out of range
    RowOutOfRange,
    /// The display's command set does not support the operation
    UnsupportedOperation,
}

impl<E> From<TruncatedSequenceError> for DisplayError<E> {
    fn from(err: TruncatedSequenceError) -> Self {
        DisplayError::TruncatedSequence(err)
    }
}

impl<E> From<UnsupportedRotationError> for DisplayError<E> {
    fn from(err: UnsupportedRotationError) -> Self {
        DisplayError::UnsupportedRotation(err)
    }
}

impl<E> From<&DisplayError<E>> for &'static str {
    fn from(err: &DisplayError<E>) -> Self {
        match err {
            DisplayError::BusWrite(_) => "Bus write error",
            DisplayError::TruncatedSequence(_) => "Truncated init sequence",
            DisplayError::UnsupportedRotation(_) => "Display rotation must be in 90 degree increments",
            DisplayError::BrightnessNotAdjustable => "Brightness not adjustable",
            DisplayError::BacklightPinError => "Backlight pin error",
            DisplayError::ColumnOutOfRange => "Column out of range",
            DisplayError::RowOutOfRange => "Row out of range",
            DisplayError::UnsupportedOperation => "Unsupported operation",
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for DisplayError<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            DisplayError::TruncatedSequence(err) => defmt::write!(fmt, "{}", err),
            DisplayError::UnsupportedRotation(err) => defmt::write!(fmt, "{}", err),
            _ => {
                let msg: &'static str = From::from(self);
                defmt::write!(fmt, "{}", msg);
            }
        }
    }
}

#[cfg(feature = "ufmt")]
impl<E> ufmt::uDisplay for DisplayError<E> {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl<E> core::fmt::Display for DisplayError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DisplayError::TruncatedSequence(err) => write!(f, "{}", err),
            DisplayError::UnsupportedRotation(err) => write!(f, "{}", err),
            _ => {
                let msg: &'static str = From::from(self);
                write!(f, "{}", msg)
            }
        }
    }
}

#[cfg(test)]
mod lib_tests {
    extern crate std;
    use std::string::ToString;

    use super::*;

    #[test]
    fn test_error_messages() {
        let err: DisplayError<()> = DisplayError::BrightnessNotAdjustable;
        assert_eq!(err.to_string(), "Brightness not adjustable");

        let err: DisplayError<()> = DisplayError::BusWrite(());
        assert_eq!(err.to_string(), "Bus write error");

        let err: DisplayError<()> = InitSequence::decode(&[0x29]).unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "Truncated init sequence at offset 0: needs 2 bytes, 1 available"
        );
        let msg: &'static str = From::from(&err);
        assert_eq!(msg, "Truncated init sequence");

        let err: DisplayError<()> = Rotation::from_degrees(30).unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "Display rotation must be in 90 degree increments, got 30"
        );
    }

    #[test]
    fn test_decode_error_propagates_with_question_mark() {
        fn build(bytes: &[u8]) -> Result<usize, DisplayError<()>> {
            let sequence = InitSequence::decode(bytes)?;
            let _rotation = Rotation::from_degrees(180)?;
            Ok(sequence.len())
        }

        assert_eq!(build(&[0x11, 0x80, 0x78, 0x29, 0x00]), Ok(2));
        assert!(matches!(
            build(&[0xe1, 0x0f, 0x00]),
            Err(DisplayError::TruncatedSequence(TruncatedSequenceError {
                offset: 0,
                required: 17,
                available: 3,
            }))
        ));
    }
}
