//! HART Protocol Library
//!
//! This crate provides encoding and decoding for the HART field bus as
//! spoken over a multi-drop FSK loop:
//!
//! - **Frames**: preambles, delimiter, short or long address, command,
//!   byte count, data and XOR checksum
//! - **Streaming**: [`HartCodec`] reassembles frames from a byte stream
//! - **Commands**: the universal command numbers and their data layouts
//! - **Replies**: typed decoding of response data
//!
//! # Example
//!
//! ```rust
//! use hart_protocol::{Address, Frame, FrameKind, HartCodec};
//!
//! let bytes = Frame::request(Address::short(3), 1, vec![]).encode().unwrap();
//!
//! let mut codec = HartCodec::new();
//! codec.push_bytes(&bytes);
//!
//! let frame = codec.next_frame().unwrap();
//! assert_eq!(frame.kind, FrameKind::Request);
//! assert_eq!(frame.address, Address::short(3));
//! ```

pub mod command;
pub mod error;
pub mod frame;
pub mod reply;
pub mod status;
pub mod units;

pub use command::UniversalCommand;
pub use error::{DecodeError, EncodeError, ReplyError};
pub use frame::{compute_checksum, decode, encode, Address, Frame, FrameKind, HartCodec, LongAddress, ShortAddress};
pub use reply::{Date, Identity, Reading, Reply, SlotReading};
pub use status::ResponseStatus;
