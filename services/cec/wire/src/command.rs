//! CEC frame builder and parser.
//!
//! A `Command` is either a formatted command (header plus opcode) or a raw
//! accumulator of header and parameter bytes when no opcode is set.

use crate::address::LogicalAddress;
use crate::opcode::Opcode;
use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of parameter bytes a command can carry
pub const MAX_PARAMETER_SIZE: usize = 64;

/// Maximum encoded frame size (header + opcode + parameters)
pub const MAX_FRAME_SIZE: usize = 1 + 1 + MAX_PARAMETER_SIZE;

/// Nibble used on the wire for an unknown address
const UNKNOWN_NIBBLE: u8 = 0x0F;

/// One CEC frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Initiator, `None` when unknown
    pub initiator: Option<LogicalAddress>,
    /// Destination, `None` when unknown
    pub destination: Option<LogicalAddress>,
    /// Opcode, `None` when the command has not been formatted with one
    pub opcode: Option<Opcode>,
    parameters: SmallVec<[u8; MAX_PARAMETER_SIZE]>,
}

impl Command {
    /// Create an empty command
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a formatted command
    pub fn with(
        initiator: LogicalAddress,
        destination: LogicalAddress,
        opcode: Option<Opcode>,
    ) -> Self {
        let mut command = Self::new();
        command.format(initiator, destination, opcode);
        command
    }

    /// Reset header, opcode and parameters
    pub fn clear(&mut self) {
        self.initiator = None;
        self.destination = None;
        self.opcode = None;
        self.parameters.clear();
    }

    /// Clear, then set the header fields and optional opcode
    pub fn format(
        &mut self,
        initiator: LogicalAddress,
        destination: LogicalAddress,
        opcode: Option<Opcode>,
    ) {
        self.clear();
        self.initiator = Some(initiator);
        self.destination = Some(destination);
        self.opcode = opcode;
    }

    /// Append one parameter byte, returns the number of bytes accepted (0 or 1)
    pub fn push_back_byte(&mut self, byte: u8) -> usize {
        if self.parameters.len() >= MAX_PARAMETER_SIZE {
            return 0;
        }
        self.parameters.push(byte);
        1
    }

    /// Append parameter bytes up to the cap, returns the number accepted
    pub fn push_back_slice(&mut self, bytes: &[u8]) -> usize {
        let room = MAX_PARAMETER_SIZE - self.parameters.len();
        let accepted = bytes.len().min(room);
        self.parameters.extend_from_slice(&bytes[..accepted]);
        accepted
    }

    /// Parameter bytes in push order
    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }

    /// Header byte (`initiator << 4 | destination`)
    pub fn header(&self) -> u8 {
        let initiator = self.initiator.map_or(UNKNOWN_NIBBLE, LogicalAddress::as_u8);
        let destination = self
            .destination
            .map_or(UNKNOWN_NIBBLE, LogicalAddress::as_u8);
        (initiator << 4) | destination
    }

    /// Size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        1 + usize::from(self.opcode.is_some()) + self.parameters.len()
    }

    /// Write the frame into `buf` when it is large enough.
    ///
    /// The required size is returned either way, so a call with an empty
    /// buffer only asks for the size.
    pub fn raw_bytes(&self, buf: &mut [u8]) -> usize {
        let required = self.encoded_len();
        if buf.len() < required {
            return required;
        }

        buf[0] = self.header();
        let mut offset = 1;
        if let Some(opcode) = self.opcode {
            buf[offset] = opcode.as_u8();
            offset += 1;
        }
        buf[offset..required].copy_from_slice(&self.parameters);
        required
    }

    /// Encode the frame into a buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.header());
        if let Some(opcode) = self.opcode {
            buf.put_u8(opcode.as_u8());
        }
        buf.put_slice(&self.parameters);
    }

    /// Encode the frame into a new contiguous buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Parse a frame.
    ///
    /// A header-only frame (a polling message) decodes with no opcode.
    pub fn decode(frame: &[u8]) -> Result<Self, crate::WireError> {
        let (&header, rest) = frame.split_first().ok_or(crate::WireError::Empty)?;
        if frame.len() > MAX_FRAME_SIZE {
            return Err(crate::WireError::Size(frame.len()));
        }

        let mut command = Command::new();
        command.initiator = Some(LogicalAddress::try_from(header >> 4)?);
        command.destination = Some(LogicalAddress::try_from(header & 0x0F)?);

        if let Some((&opcode, parameters)) = rest.split_first() {
            command.opcode = Some(Opcode::try_from(opcode)?);
            command.parameters.extend_from_slice(parameters);
        }

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.header())?;
        if let Some(opcode) = self.opcode {
            write!(f, ":{:02X}", opcode.as_u8())?;
        }
        for byte in self.parameters.iter() {
            write!(f, ":{:02X}", byte)?;
        }
        Ok(())
    }
}
