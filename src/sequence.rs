//! Decoding and encoding of bitpacked initialization sequences.
//!
//! Each command is laid out as:
//! ```text
//! command := opcode:u8 count_and_flag:u8 param:u8{n} [delay:u8]
//!   n = count_and_flag & 0x7F
//!   has_delay = (count_and_flag & 0x80) != 0
//! ```
//! Commands follow each other with no padding. Vendor sequences written for other
//! drivers using this layout can be used unchanged.
use core::fmt::Display;

use crate::bit_configurations::{CountAndFlag, MAX_PARAMETER_COUNT};

const HEADER_LEN: usize = 2;

/// A buffer ran out before a command's header, parameters or delay byte were complete.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct TruncatedSequenceError {
    /// Offset of the opcode byte of the incomplete command.
    pub offset: usize,
    /// Bytes the command needed starting at `offset`.
    pub required: usize,
    /// Bytes actually left in the buffer starting at `offset`.
    pub available: usize,
}

impl From<&TruncatedSequenceError> for &'static str {
    fn from(_err: &TruncatedSequenceError) -> Self {
        "Truncated init sequence"
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TruncatedSequenceError {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Truncated init sequence at offset {}: needs {} bytes, {} available",
            self.offset,
            self.required,
            self.available
        );
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for TruncatedSequenceError {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        ufmt::uwrite!(
            w,
            "Truncated init sequence at offset {}: needs {} bytes, {} available",
            self.offset,
            self.required,
            self.available
        )
    }
}

impl Display for TruncatedSequenceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Truncated init sequence at offset {}: needs {} bytes, {} available",
            self.offset, self.required, self.available
        )
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
/// Errors that can occur when building or encoding commands
pub enum EncodeError {
    /// More than 127 parameters were given for one command
    TooManyParameters,
    /// The output buffer cannot hold the encoded commands
    BufferTooSmall,
}

impl From<&EncodeError> for &'static str {
    fn from(err: &EncodeError) -> Self {
        match err {
            EncodeError::TooManyParameters => "Too many command parameters",
            EncodeError::BufferTooSmall => "Buffer too small",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EncodeError {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for EncodeError {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

/// A single controller command: opcode, its parameter bytes, and an optional delay
/// in milliseconds to wait after it has been sent.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Command<'a> {
    opcode: u8,
    parameters: &'a [u8],
    delay_ms: Option<u8>,
}

impl<'a> Command<'a> {
    /// Create a command without a delay. At most 127 parameters fit in the header.
    pub fn new(opcode: u8, parameters: &'a [u8]) -> Result<Self, EncodeError> {
        if parameters.len() > MAX_PARAMETER_COUNT {
            return Err(EncodeError::TooManyParameters);
        }
        Ok(Self {
            opcode,
            parameters,
            delay_ms: None,
        })
    }

    /// Returns the command with a post-command delay.
    pub fn with_delay(mut self, delay_ms: u8) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn parameters(&self) -> &'a [u8] {
        self.parameters
    }

    pub fn delay_ms(&self) -> Option<u8> {
        self.delay_ms
    }

    /// Number of bytes this command occupies in the bitpacked format.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.parameters.len() + usize::from(self.delay_ms.is_some())
    }

    /// Write the command into the front of `out`. Returns the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let len = self.encoded_len();
        let out = out.get_mut(..len).ok_or(EncodeError::BufferTooSmall)?;
        // `new` bounds the parameter count, so the cast cannot lose bits
        let header = CountAndFlag::new(self.parameters.len() as u8, self.delay_ms.is_some());
        out[0] = self.opcode;
        out[1] = header.bits();
        out[HEADER_LEN..HEADER_LEN + self.parameters.len()].copy_from_slice(self.parameters);
        if let Some(delay) = self.delay_ms {
            out[len - 1] = delay;
        }
        Ok(len)
    }

    /// Reads the command starting at `offset`. Returns the command and the offset just past it.
    fn read(buffer: &'a [u8], offset: usize) -> Result<(Self, usize), TruncatedSequenceError> {
        let available = buffer.len().saturating_sub(offset);
        let header = buffer
            .get(offset..offset + HEADER_LEN)
            .ok_or(TruncatedSequenceError {
                offset,
                required: HEADER_LEN,
                available,
            })?;
        let opcode = header[0];
        let flags = CountAndFlag(header[1]);
        let param_count = usize::from(flags.param_count());
        let required = HEADER_LEN + param_count + usize::from(flags.has_delay());
        if required > available {
            return Err(TruncatedSequenceError {
                offset,
                required,
                available,
            });
        }

        let params_start = offset + HEADER_LEN;
        let parameters = &buffer[params_start..params_start + param_count];
        let end = offset + required;
        let delay_ms = if flags.has_delay() {
            Some(buffer[end - 1])
        } else {
            None
        };
        Ok((
            Self {
                opcode,
                parameters,
                delay_ms,
            },
            end,
        ))
    }
}

/// A validated initialization sequence. The sequence borrows the buffer it was decoded
/// from and yields its commands in program order.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct InitSequence<'a> {
    bytes: &'a [u8],
    len: usize,
}

impl<'a> InitSequence<'a> {
    /// Scan `buffer` once and validate every command in it. Nothing is returned unless the
    /// whole buffer decodes, so a short buffer yields no commands at all.
    pub fn decode(buffer: &'a [u8]) -> Result<Self, TruncatedSequenceError> {
        let mut cursor = 0;
        let mut len = 0;
        while cursor < buffer.len() {
            let (_command, next) = Command::read(buffer, cursor)?;
            cursor = next;
            len += 1;
        }
        #[cfg(feature = "defmt")]
        defmt::debug!("Decoded init sequence: {} commands in {} bytes", len, buffer.len());
        Ok(Self { bytes: buffer, len })
    }

    /// Number of commands in the sequence
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bitpacked bytes the sequence was decoded from.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn iter(&self) -> Commands<'a> {
        Commands {
            bytes: self.bytes,
            cursor: 0,
        }
    }

    /// Re-encode the decoded commands into `out`. Returns the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        encode_commands(self.iter(), out)
    }
}

impl<'a> IntoIterator for &InitSequence<'a> {
    type Item = Command<'a>;
    type IntoIter = Commands<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the commands of an `InitSequence`.
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Iterator for Commands<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.bytes.len() {
            return None;
        }
        // the buffer was validated by `InitSequence::decode`
        let (command, next) = Command::read(self.bytes, self.cursor).ok()?;
        self.cursor = next;
        Some(command)
    }
}

/// Write `commands` back to back into `out` in the bitpacked format. Returns the number
/// of bytes written.
pub fn encode_commands<'c, I>(commands: I, out: &mut [u8]) -> Result<usize, EncodeError>
where
    I: IntoIterator<Item = Command<'c>>,
{
    let mut written = 0;
    for command in commands {
        written += command.encode_into(&mut out[written..])?;
    }
    Ok(written)
}

#[cfg(test)]
mod lib_tests {
    extern crate std;
    use super::*;

    const GAMMA_PARAMS: [u8; 15] = [
        0x00, 0x0E, 0x14, 0x03, 0x11, 0x07, 0x31, 0xC1, 0x48, 0x08, 0x0F, 0x0C, 0x31, 0x36, 0x0F,
    ];

    // portion of an ILI9341 init sequence: set gamma, exit sleep + 120 ms, display on + 120 ms
    const ILI9341_PARTIAL: [u8; 23] = [
        0xe1, 0x0f, 0x00, 0x0E, 0x14, 0x03, 0x11, 0x07, 0x31, 0xC1, 0x48, 0x08, 0x0F, 0x0C, 0x31,
        0x36, 0x0F, // set gamma
        0x11, 0x80, 0x78, // exit sleep
        0x29, 0x80, 0x78, // display on
    ];

    #[test]
    fn test_decode_gamma_command() {
        let mut buffer = std::vec![0xe1, 0x0f];
        buffer.extend_from_slice(&GAMMA_PARAMS);
        let sequence = InitSequence::decode(&buffer).unwrap();
        assert_eq!(sequence.len(), 1);
        let command = sequence.iter().next().unwrap();
        assert_eq!(command.opcode(), 0xe1);
        assert_eq!(command.parameters(), &GAMMA_PARAMS);
        assert_eq!(command.delay_ms(), None);
    }

    #[test]
    fn test_decode_delay_only_commands() {
        let sequence = InitSequence::decode(&[0x11, 0x80, 0x78]).unwrap();
        let commands: std::vec::Vec<Command> = sequence.iter().collect();
        assert_eq!(
            commands,
            std::vec![Command::new(0x11, &[]).unwrap().with_delay(120)]
        );

        let sequence = InitSequence::decode(&[0x29, 0x80, 0x78]).unwrap();
        let commands: std::vec::Vec<Command> = sequence.iter().collect();
        assert_eq!(
            commands,
            std::vec![Command::new(0x29, &[]).unwrap().with_delay(120)]
        );
    }

    #[test]
    fn test_decode_full_sequence_in_order() {
        let sequence = InitSequence::decode(&ILI9341_PARTIAL).unwrap();
        assert_eq!(sequence.len(), 3);
        assert!(!sequence.is_empty());
        let commands: std::vec::Vec<Command> = sequence.iter().collect();
        assert_eq!(
            commands,
            std::vec![
                Command::new(0xe1, &GAMMA_PARAMS).unwrap(),
                Command::new(0x11, &[]).unwrap().with_delay(120),
                Command::new(0x29, &[]).unwrap().with_delay(120),
            ]
        );
    }

    #[test]
    fn test_decode_zero_parameter_command_without_delay() {
        // software reset followed by display on; each takes exactly two bytes
        let sequence = InitSequence::decode(&[0x01, 0x00, 0x29, 0x00]).unwrap();
        let commands: std::vec::Vec<Command> = sequence.iter().collect();
        assert_eq!(
            commands,
            std::vec![
                Command::new(0x01, &[]).unwrap(),
                Command::new(0x29, &[]).unwrap(),
            ]
        );
        assert_eq!(commands[0].encoded_len(), 2);
    }

    #[test]
    fn test_decode_parameters_with_delay() {
        let sequence = InitSequence::decode(&[0x3a, 0x81, 0x55, 0x0a]).unwrap();
        let command = sequence.iter().next().unwrap();
        assert_eq!(command.opcode(), 0x3a);
        assert_eq!(command.parameters(), &[0x55]);
        assert_eq!(command.delay_ms(), Some(10));
    }

    #[test]
    fn test_decode_empty_buffer() {
        let sequence = InitSequence::decode(&[]).unwrap();
        assert!(sequence.is_empty());
        assert_eq!(sequence.iter().count(), 0);
    }

    #[test]
    fn test_decode_truncated_parameters() {
        // declares 15 parameters but only 5 follow
        let buffer = [0xe1, 0x0f, 0x00, 0x0E, 0x14, 0x03, 0x11];
        assert_eq!(
            InitSequence::decode(&buffer),
            Err(TruncatedSequenceError {
                offset: 0,
                required: 17,
                available: 7,
            })
        );
    }

    #[test]
    fn test_decode_truncated_after_valid_commands() {
        // a valid command, then one that is missing its delay byte
        let buffer = [0x11, 0x80, 0x78, 0x29, 0x80];
        assert_eq!(
            InitSequence::decode(&buffer),
            Err(TruncatedSequenceError {
                offset: 3,
                required: 3,
                available: 2,
            })
        );
    }

    #[test]
    fn test_decode_truncated_header() {
        let buffer = [0x11, 0x80, 0x78, 0x29];
        assert_eq!(
            InitSequence::decode(&buffer),
            Err(TruncatedSequenceError {
                offset: 3,
                required: 2,
                available: 1,
            })
        );
    }

    #[test]
    fn test_round_trip_reproduces_buffer() {
        let sequence = InitSequence::decode(&ILI9341_PARTIAL).unwrap();
        let mut out = [0u8; 32];
        let written = sequence.encode_into(&mut out).unwrap();
        assert_eq!(&out[..written], &ILI9341_PARTIAL);
        assert_eq!(sequence.as_bytes(), &ILI9341_PARTIAL);
    }

    #[test]
    fn test_round_trip_varied_buffers() {
        // 127 parameters followed by a delay
        let mut max_params = std::vec![0xb0, 0xff];
        max_params.extend((0..127u8).map(|i| i.wrapping_mul(3)));
        max_params.push(0x0a);

        let buffers: [std::vec::Vec<u8>; 4] = [
            max_params,
            // parameters and a delay, then a plain command
            std::vec![0x3a, 0x81, 0x55, 0x0a, 0x36, 0x01, 0x08],
            // back to back zero parameter commands
            std::vec![0x01, 0x00, 0x11, 0x00, 0x13, 0x00, 0x29, 0x00],
            std::vec![],
        ];
        for buffer in buffers.iter() {
            let sequence = InitSequence::decode(buffer).unwrap();
            let mut out = [0u8; 160];
            let written = sequence.encode_into(&mut out).unwrap();
            assert_eq!(&out[..written], buffer.as_slice());
        }
        let sequence = InitSequence::decode(&buffers[0]).unwrap();
        let command = sequence.iter().next().unwrap();
        assert_eq!(command.parameters().len(), 127);
        assert_eq!(command.delay_ms(), Some(10));
    }

    #[test]
    fn test_encode_commands() {
        let params = [0x00, 0x00, 0x00, 0xef];
        let commands = [
            Command::new(0x01, &[]).unwrap().with_delay(150),
            Command::new(0x2a, &params).unwrap(),
            Command::new(0x29, &[]).unwrap(),
        ];
        let mut out = [0u8; 16];
        let written = encode_commands(commands.iter().copied(), &mut out).unwrap();
        assert_eq!(
            &out[..written],
            &[0x01, 0x80, 150, 0x2a, 0x04, 0x00, 0x00, 0x00, 0xef, 0x29, 0x00]
        );
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let sequence = InitSequence::decode(&ILI9341_PARTIAL).unwrap();
        let mut out = [0u8; 20];
        assert_eq!(
            sequence.encode_into(&mut out),
            Err(EncodeError::BufferTooSmall)
        );
    }

    #[test]
    fn test_command_parameter_limit() {
        let params = [0u8; 128];
        assert_eq!(
            Command::new(0xb0, &params),
            Err(EncodeError::TooManyParameters)
        );
        let command = Command::new(0xb0, &params[..127]).unwrap();
        let mut out = [0u8; 129];
        assert_eq!(command.encode_into(&mut out), Ok(129));
        assert_eq!(out[1], 0x7f);
    }
}
