//! HART Frame Codec
//!
//! A HART frame is a run of preambles followed by the checksummed core:
//!
//! ```text
//! FF FF FF FF FF [delim] [address...] [cmd] [bc] [data...] [chk]
//! ```
//!
//! - `FF`: Preamble, at least five when sending, any number when receiving
//! - `delim`: Start character. Bit 7 selects the long address form, bits 0-2
//!   select the direction (`0x02` STX master to slave, `0x06` ACK slave to master)
//! - `address`: 1 byte (short form) or 5 bytes (long form)
//! - `cmd`: Command number
//! - `bc`: Byte count of the data field
//! - `chk`: XOR of every byte from the delimiter through the last data byte
//!
//! # Address Encoding
//! Short form: `[master:1][burst:1][polling:6]`
//!
//! Long form: `[master:1][burst:1][manufacturer:6] [device type] [device id:24]`

use std::fmt;

use crate::error::{DecodeError, EncodeError};
use crate::status::ResponseStatus;

/// Preamble byte
pub const PREAMBLE: u8 = 0xFF;
/// Master to slave, short address
pub const STX_SHORT: u8 = 0x02;
/// Master to slave, long address
pub const STX_LONG: u8 = 0x82;
/// Slave to master, short address
pub const ACK_SHORT: u8 = 0x06;
/// Slave to master, long address
pub const ACK_LONG: u8 = 0x86;

/// Fewest preambles a master may send
pub const MIN_PREAMBLES: u8 = 5;
/// Most preambles a master may send
pub const MAX_PREAMBLES: u8 = 20;
/// Largest data field a frame can carry
pub const MAX_PAYLOAD_LEN: usize = 253;
/// Highest short-form polling address
pub const MAX_POLLING_ADDRESS: u8 = 63;
/// Highest manufacturer id representable in a long address
pub const MAX_LONG_MANUFACTURER_ID: u8 = 0x3F;
/// Highest 24-bit device id
pub const MAX_DEVICE_ID: u32 = 0x00FF_FFFF;

const LONG_FORM_BIT: u8 = 0x80;
const PRIMARY_MASTER_BIT: u8 = 0x80;
const ADDRESS_BITS: u8 = 0x3F;
const SHORT_ADDRESS_LEN: usize = 1;
const LONG_ADDRESS_LEN: usize = 5;

/// Longest possible frame on the wire
const MAX_FRAME_LEN: usize =
    MAX_PREAMBLES as usize + 1 + LONG_ADDRESS_LEN + 2 + MAX_PAYLOAD_LEN + 1;

/// Short-form (polling) address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortAddress {
    /// Polling address, 0..=63
    pub polling: u8,
}

/// Long-form address derived from a device's unique identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LongAddress {
    /// Manufacturer identification code, low six bits
    pub manufacturer_id: u8,
    /// Manufacturer's device type code
    pub device_type: u8,
    /// 24-bit device identification number
    pub device_id: u32,
}

/// Address field of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// One-byte polling address
    Short(ShortAddress),
    /// Five-byte unique identifier address
    Long(LongAddress),
}

impl Address {
    /// Create a short-form address
    pub fn short(polling: u8) -> Self {
        Self::Short(ShortAddress { polling })
    }

    /// Create a long-form address
    pub fn long(manufacturer_id: u8, device_type: u8, device_id: u32) -> Self {
        Self::Long(LongAddress {
            manufacturer_id,
            device_type,
            device_id,
        })
    }

    /// Whether this address uses the five-byte form
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long(_))
    }

    /// Number of bytes the address occupies on the wire
    pub fn wire_len(&self) -> usize {
        if self.is_long() {
            LONG_ADDRESS_LEN
        } else {
            SHORT_ADDRESS_LEN
        }
    }

    /// Check every field against its bit width
    pub fn validate(&self) -> Result<(), EncodeError> {
        match self {
            Self::Short(addr) if addr.polling > MAX_POLLING_ADDRESS => Err(
                EncodeError::InvalidAddress(format!("polling address {} > 63", addr.polling)),
            ),
            Self::Long(addr) if addr.manufacturer_id > MAX_LONG_MANUFACTURER_ID => {
                Err(EncodeError::InvalidAddress(format!(
                    "manufacturer id 0x{:02X} exceeds six bits",
                    addr.manufacturer_id
                )))
            }
            Self::Long(addr) if addr.device_id > MAX_DEVICE_ID => Err(
                EncodeError::InvalidAddress(format!(
                    "device id 0x{:X} exceeds 24 bits",
                    addr.device_id
                )),
            ),
            _ => Ok(()),
        }
    }

    fn write(&self, primary_master: bool, out: &mut Vec<u8>) {
        let master = if primary_master { PRIMARY_MASTER_BIT } else { 0 };
        match self {
            Self::Short(addr) => out.push(master | (addr.polling & ADDRESS_BITS)),
            Self::Long(addr) => {
                out.push(master | (addr.manufacturer_id & ADDRESS_BITS));
                out.push(addr.device_type);
                out.extend_from_slice(&addr.device_id.to_be_bytes()[1..]);
            }
        }
    }

    /// Parse an address field, returning the address and the master bit
    fn read(bytes: &[u8]) -> (Self, bool) {
        let primary_master = bytes[0] & PRIMARY_MASTER_BIT != 0;
        let address = if bytes.len() == LONG_ADDRESS_LEN {
            Self::long(
                bytes[0] & ADDRESS_BITS,
                bytes[1],
                u32::from_be_bytes([0, bytes[2], bytes[3], bytes[4]]),
            )
        } else {
            Self::short(bytes[0] & ADDRESS_BITS)
        };
        (address, primary_master)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(addr) => write!(f, "#{}", addr.polling),
            Self::Long(addr) => write!(
                f,
                "{:02X}:{:02X}:{:06X}",
                addr.manufacturer_id, addr.device_type, addr.device_id
            ),
        }
    }
}

/// Direction of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    /// Master to slave (STX)
    Request,
    /// Slave to master (ACK)
    Response,
}

impl FrameKind {
    /// Delimiter byte for this direction and address form
    pub fn delimiter(self, long: bool) -> u8 {
        let base = match self {
            Self::Request => STX_SHORT,
            Self::Response => ACK_SHORT,
        };
        if long {
            base | LONG_FORM_BIT
        } else {
            base
        }
    }

    fn from_delimiter(delimiter: u8) -> Result<(Self, bool), DecodeError> {
        match delimiter {
            STX_SHORT => Ok((Self::Request, false)),
            STX_LONG => Ok((Self::Request, true)),
            ACK_SHORT => Ok((Self::Response, false)),
            ACK_LONG => Ok((Self::Response, true)),
            other => Err(DecodeError::MalformedDelimiter(other)),
        }
    }
}

/// One wire-level HART frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// Direction
    pub kind: FrameKind,
    /// Number of preamble bytes
    pub preamble_count: u8,
    /// Target (request) or source (response) address
    pub address: Address,
    /// Primary master bit of the address field
    pub primary_master: bool,
    /// Command number
    pub command: u8,
    /// Data field. For responses this starts with the two status bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a request from the primary master with the minimum preamble count
    pub fn request(address: Address, command: u8, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Request,
            preamble_count: MIN_PREAMBLES,
            address,
            primary_master: true,
            command,
            payload,
        }
    }

    /// Create a response carrying the two status bytes ahead of `data`
    pub fn response(address: Address, command: u8, status: ResponseStatus, data: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(data.len() + 2);
        payload.extend_from_slice(&status.to_bytes());
        payload.extend_from_slice(data);
        Self {
            kind: FrameKind::Response,
            preamble_count: MIN_PREAMBLES,
            address,
            primary_master: true,
            command,
            payload,
        }
    }

    /// Set the preamble count
    pub fn with_preambles(mut self, preamble_count: u8) -> Self {
        self.preamble_count = preamble_count;
        self
    }

    /// Set the master bit
    pub fn with_primary_master(mut self, primary_master: bool) -> Self {
        self.primary_master = primary_master;
        self
    }

    /// Whether the frame uses the long address form
    pub fn is_long_format(&self) -> bool {
        self.address.is_long()
    }

    /// Delimiter byte
    pub fn delimiter(&self) -> u8 {
        self.kind.delimiter(self.is_long_format())
    }

    /// Length of the data field
    pub fn byte_count(&self) -> usize {
        self.payload.len()
    }

    /// Checksum the encoder writes for this frame
    pub fn checksum(&self) -> u8 {
        let mut core = Vec::with_capacity(self.core_len());
        self.write_core(&mut core);
        compute_checksum(&core)
    }

    /// Status bytes of a response, if present
    pub fn status(&self) -> Option<ResponseStatus> {
        match self.kind {
            FrameKind::Response => ResponseStatus::from_bytes(&self.payload),
            FrameKind::Request => None,
        }
    }

    /// Command data with the status bytes of a response stripped
    pub fn data(&self) -> &[u8] {
        match self.kind {
            FrameKind::Response => self.payload.get(2..).unwrap_or(&[]),
            FrameKind::Request => &self.payload,
        }
    }

    /// Check all fields against their ranges without producing bytes
    pub fn validate(&self) -> Result<(), EncodeError> {
        if !(MIN_PREAMBLES..=MAX_PREAMBLES).contains(&self.preamble_count) {
            return Err(EncodeError::InvalidPreambleCount {
                count: self.preamble_count,
                min: MIN_PREAMBLES,
                max: MAX_PREAMBLES,
            });
        }
        self.address.validate()?;
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(EncodeError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(())
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.validate()?;

        let mut out = Vec::with_capacity(self.preamble_count as usize + self.core_len() + 1);
        out.resize(self.preamble_count as usize, PREAMBLE);
        self.write_core(&mut out);
        let checksum = compute_checksum(&out[self.preamble_count as usize..]);
        out.push(checksum);
        Ok(out)
    }

    /// Decode wire bytes into a frame
    ///
    /// Accepts any number of preambles (at least one) and either direction.
    /// Unknown command numbers are not an error. When the bytes after the
    /// preambles do not XOR to zero the error is always a checksum
    /// mismatch, even if a corrupted delimiter or byte count also breaks
    /// the frame structure.
    pub fn decode(data: &[u8]) -> Result<Frame, DecodeError> {
        let preambles = data.iter().take_while(|&&b| b == PREAMBLE).count();
        if preambles == 0 {
            return Err(DecodeError::MissingPreamble);
        }

        let core = &data[preambles..];
        Self::decode_core(core, preambles).map_err(|e| match core.split_last() {
            Some((&actual, body)) if compute_checksum(core) != 0 => {
                DecodeError::ChecksumMismatch {
                    expected: compute_checksum(body),
                    actual,
                }
            }
            _ => e,
        })
    }

    fn decode_core(core: &[u8], preambles: usize) -> Result<Frame, DecodeError> {
        let Some(&delimiter) = core.first() else {
            return Err(DecodeError::Truncated { needed: 1 });
        };
        let (kind, long) = FrameKind::from_delimiter(delimiter)?;
        let addr_len = if long {
            LONG_ADDRESS_LEN
        } else {
            SHORT_ADDRESS_LEN
        };

        // delimiter + address + command + byte count
        let header_len = 1 + addr_len + 2;
        if core.len() < header_len {
            return Err(DecodeError::Truncated {
                needed: header_len - core.len(),
            });
        }

        let byte_count = core[header_len - 1] as usize;
        let frame_len = header_len + byte_count + 1;
        if core.len() < frame_len {
            return Err(DecodeError::Truncated {
                needed: frame_len - core.len(),
            });
        }

        let expected = compute_checksum(&core[..frame_len - 1]);
        let actual = core[frame_len - 1];
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        if core.len() > frame_len {
            return Err(DecodeError::TrailingBytes(core.len() - frame_len));
        }

        let (address, primary_master) = Address::read(&core[1..1 + addr_len]);
        Ok(Frame {
            kind,
            preamble_count: u8::try_from(preambles).unwrap_or(u8::MAX),
            address,
            primary_master,
            command: core[1 + addr_len],
            payload: core[header_len..header_len + byte_count].to_vec(),
        })
    }

    fn core_len(&self) -> usize {
        1 + self.address.wire_len() + 2 + self.payload.len()
    }

    fn write_core(&self, out: &mut Vec<u8>) {
        out.push(self.delimiter());
        self.address.write(self.primary_master, out);
        out.push(self.command);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
    }
}

/// Encode a request frame from its parts
///
/// Fails with [`EncodeError::InvalidAddress`] when the address variant
/// disagrees with `is_long_format`.
pub fn encode(
    address: &Address,
    command: u8,
    payload: &[u8],
    preamble_count: u8,
    is_long_format: bool,
) -> Result<Vec<u8>, EncodeError> {
    if address.is_long() != is_long_format {
        return Err(EncodeError::InvalidAddress(format!(
            "address {} does not match {} frame format",
            address,
            if is_long_format { "long" } else { "short" }
        )));
    }
    Frame::request(*address, command, payload.to_vec())
        .with_preambles(preamble_count)
        .encode()
}

/// Decode a frame from wire bytes
pub fn decode(data: &[u8]) -> Result<Frame, DecodeError> {
    Frame::decode(data)
}

/// XOR of all bytes
pub fn compute_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Streaming HART frame codec
///
/// Accumulates bytes from a line and yields complete frames. Garbage before
/// a preamble run is discarded; frames that fail to decode are dropped.
pub struct HartCodec {
    buffer: Vec<u8>,
}

impl HartCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Push raw bytes into the buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent buffer overflow
        if self.buffer.len() > MAX_FRAME_LEN * 4 {
            let start = self.buffer.len() - MAX_FRAME_LEN;
            self.buffer.drain(..start);
        }
    }

    /// Try to extract the next complete frame
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.next_frame_with_bytes().map(|(frame, _)| frame)
    }

    /// Try to extract the next complete frame along with its raw bytes
    pub fn next_frame_with_bytes(&mut self) -> Option<(Frame, Vec<u8>)> {
        loop {
            let start = self.buffer.iter().position(|&b| b == PREAMBLE)?;
            if start > 0 {
                self.buffer.drain(..start);
            }

            let preambles = self.buffer.iter().take_while(|&&b| b == PREAMBLE).count();
            let delimiter = *self.buffer.get(preambles)?;
            let addr_len = match FrameKind::from_delimiter(delimiter) {
                Ok((_, true)) => LONG_ADDRESS_LEN,
                Ok((_, false)) => SHORT_ADDRESS_LEN,
                Err(e) => {
                    tracing::warn!("Dropping HART bytes: {}", e);
                    self.buffer.drain(..=preambles);
                    continue;
                }
            };

            let bc_pos = preambles + 1 + addr_len + 1;
            let byte_count = *self.buffer.get(bc_pos)? as usize;
            let frame_len = bc_pos + 1 + byte_count + 1;
            if self.buffer.len() < frame_len {
                return None;
            }

            let bytes: Vec<u8> = self.buffer.drain(..frame_len).collect();
            match Frame::decode(&bytes) {
                Ok(frame) => return Some((frame, bytes)),
                Err(e) => {
                    tracing::warn!("Failed to decode HART frame: {}", e);
                }
            }
        }
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for HartCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_short_request() {
        let frame = Frame::request(Address::short(1), 1, vec![]);
        let encoded = frame.encode().unwrap();
        // 5 preambles, STX, master|1, cmd 1, bc 0, checksum
        assert_eq!(
            encoded,
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0x81, 0x01, 0x00, 0x82]
        );
    }

    #[test]
    fn test_encode_long_request() {
        let frame = Frame::request(Address::long(0x3E, 0xE9, 0x002711), 0, vec![]);
        let encoded = frame.encode().unwrap();
        assert_eq!(
            &encoded[5..],
            &[0x82, 0xBE, 0xE9, 0x00, 0x27, 0x11, 0x00, 0x00, 0xE3]
        );
        assert_eq!(compute_checksum(&encoded[5..]), 0);
    }

    #[test]
    fn test_encode_via_parts() {
        let bytes = encode(&Address::short(5), 3, &[], 7, false).unwrap();
        assert_eq!(bytes.iter().take_while(|&&b| b == PREAMBLE).count(), 7);
        assert_eq!(bytes[7], STX_SHORT);

        let err = encode(&Address::short(5), 3, &[], 7, true).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidAddress(_)));
    }

    #[test]
    fn test_encode_rejects_invalid_address() {
        let err = Frame::request(Address::short(64), 0, vec![])
            .encode()
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidAddress(_)));

        let err = Frame::request(Address::long(0x40, 0, 0), 0, vec![])
            .encode()
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidAddress(_)));

        let err = Frame::request(Address::long(0x10, 0, 0x0100_0000), 0, vec![])
            .encode()
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidAddress(_)));
    }

    #[test]
    fn test_encode_rejects_large_payload() {
        let err = Frame::request(Address::short(0), 17, vec![0; 254])
            .encode()
            .unwrap_err();
        assert_eq!(err, EncodeError::PayloadTooLarge { len: 254, max: 253 });

        assert!(Frame::request(Address::short(0), 17, vec![0; 253])
            .encode()
            .is_ok());
    }

    #[test]
    fn test_encode_rejects_preamble_count() {
        for count in [0, 4, 21] {
            let err = Frame::request(Address::short(0), 0, vec![])
                .with_preambles(count)
                .encode()
                .unwrap_err();
            assert!(matches!(err, EncodeError::InvalidPreambleCount { .. }));
        }
    }

    #[test]
    fn test_decode_accepts_few_preambles() {
        let frame = Frame::decode(&[0xFF, 0x02, 0x81, 0x01, 0x00, 0x82]).unwrap();
        assert_eq!(frame.preamble_count, 1);
        assert_eq!(frame.address, Address::short(1));
        assert!(frame.primary_master);
        assert_eq!(frame.command, 1);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_decode_response_status() {
        let frame = Frame::response(
            Address::short(3),
            1,
            ResponseStatus::new(0, 0x40),
            &[32, 0x41, 0xA8, 0, 0],
        );
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded.kind, FrameKind::Response);
        assert_eq!(decoded.delimiter(), ACK_SHORT);
        assert_eq!(decoded.status(), Some(ResponseStatus::new(0, 0x40)));
        assert_eq!(decoded.data(), &[32, 0x41, 0xA8, 0, 0]);
    }

    #[test]
    fn test_corrupted_header_is_a_checksum_mismatch() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0x81, 0x01, 0x00, 0x82];
        assert!(Frame::decode(&bytes).is_ok());

        // Delimiter and byte count steer the parser
        for idx in [5, 8] {
            for bit in 0..8 {
                let mut flipped = bytes;
                flipped[idx] ^= 1 << bit;
                assert!(
                    matches!(
                        Frame::decode(&flipped),
                        Err(DecodeError::ChecksumMismatch { .. })
                    ),
                    "byte {} bit {}",
                    idx,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Frame::decode(&[]), Err(DecodeError::MissingPreamble));
        assert_eq!(
            Frame::decode(&[0x02, 0x81, 0x01, 0x00, 0x82]),
            Err(DecodeError::MissingPreamble)
        );
        assert_eq!(
            Frame::decode(&[0xFF, 0xFF]),
            Err(DecodeError::Truncated { needed: 1 })
        );
        assert_eq!(
            Frame::decode(&[0xFF, 0x03, 0x81, 0x01, 0x00, 0x83]),
            Err(DecodeError::MalformedDelimiter(0x03))
        );
        assert_eq!(
            Frame::decode(&[0xFF, 0x02, 0x81, 0x01, 0x02, 0x80]),
            Err(DecodeError::Truncated { needed: 2 })
        );
        assert_eq!(
            Frame::decode(&[0xFF, 0x02, 0x81, 0x01, 0x00, 0x83]),
            Err(DecodeError::ChecksumMismatch {
                expected: 0x82,
                actual: 0x83
            })
        );
        assert_eq!(
            Frame::decode(&[0xFF, 0x02, 0x81, 0x01, 0x00, 0x82, 0x00]),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let bytes = Frame::request(Address::short(2), 200, vec![1, 2, 3])
            .encode()
            .unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.command, 200);
    }

    #[test]
    fn test_checksum_matches_encoder() {
        let frame = Frame::request(Address::short(9), 18, b"TAG".to_vec());
        let encoded = frame.encode().unwrap();
        assert_eq!(frame.checksum(), *encoded.last().unwrap());
    }

    #[test]
    fn test_streaming_decode() {
        let mut codec = HartCodec::new();
        let bytes = Frame::request(Address::short(4), 1, vec![])
            .encode()
            .unwrap();

        codec.push_bytes(&bytes[..6]);
        assert!(codec.next_frame().is_none());

        codec.push_bytes(&bytes[6..]);
        let (frame, raw) = codec.next_frame_with_bytes().unwrap();
        assert_eq!(frame.address, Address::short(4));
        assert_eq!(raw, bytes);
        assert!(codec.next_frame().is_none());
    }

    #[test]
    fn test_streaming_resync_after_garbage() {
        let mut codec = HartCodec::new();
        let good = Frame::request(Address::short(7), 0, vec![])
            .encode()
            .unwrap();
        let mut corrupt = good.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;

        codec.push_bytes(&[0x00, 0x13]);
        codec.push_bytes(&corrupt);
        codec.push_bytes(&[0xFF, 0x55]);
        codec.push_bytes(&good);

        let frame = codec.next_frame().unwrap();
        assert_eq!(frame.address, Address::short(7));
        assert!(codec.next_frame().is_none());
    }

    fn address() -> impl Strategy<Value = Address> {
        prop_oneof![
            (0u8..=MAX_POLLING_ADDRESS).prop_map(Address::short),
            (0u8..=MAX_LONG_MANUFACTURER_ID, any::<u8>(), 0u32..=MAX_DEVICE_ID)
                .prop_map(|(m, t, id)| Address::long(m, t, id)),
        ]
    }

    fn frame() -> impl Strategy<Value = Frame> {
        (
            prop_oneof![Just(FrameKind::Request), Just(FrameKind::Response)],
            MIN_PREAMBLES..=MAX_PREAMBLES,
            address(),
            any::<bool>(),
            any::<u8>(),
            prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
        )
            .prop_map(
                |(kind, preamble_count, address, primary_master, command, payload)| Frame {
                    kind,
                    preamble_count,
                    address,
                    primary_master,
                    command,
                    payload,
                },
            )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(frame in frame()) {
            let bytes = frame.encode().unwrap();
            let decoded = Frame::decode(&bytes).unwrap();
            prop_assert_eq!(decoded.checksum(), *bytes.last().unwrap());
            prop_assert_eq!(decoded, frame);
        }

        #[test]
        fn single_bit_flip_is_detected(frame in frame(), pos in any::<prop::sample::Index>(), bit in 0u8..8) {
            let bytes = frame.encode().unwrap();
            let preambles = frame.preamble_count as usize;

            let idx = preambles + pos.index(bytes.len() - preambles);
            let mut flipped = bytes.clone();
            flipped[idx] ^= 1 << bit;

            let result = Frame::decode(&flipped);
            let is_checksum_mismatch = matches!(result, Err(DecodeError::ChecksumMismatch { .. }));
            prop_assert!(is_checksum_mismatch, "byte {} bit {}: {:?}", idx, bit, result);
        }
    }
}
