//! CRC-framed binary wire codec for Beehive sync sessions (§6.1).
//!
//! Layered deliberately thin: [`framer`] knows only about bytes and
//! running checksums, [`messages`]/[`fullsync`] know field layouts, and
//! turning those bytes into schema-aware `AttributeRecord`s is left to
//! `beehive_core::codec` one layer up.

pub mod crc;
pub mod errors;
pub mod framer;
pub mod fullsync;
pub mod messages;

pub use crc::Crc16;
pub use errors::WireError;
pub use framer::{FrameReader, FrameWriter, MAX_LONG_LEN, MAX_SHORT_LEN};
pub use messages::{
    AuthOpener, JwtSignIn, OperationTag, PasswordSignIn, Reconnect, ResponseCode, SignOffJwt, SignOffLocal, SignUp,
};
