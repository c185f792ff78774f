//! Frame reader/writer for the CRC-checked binary protocol (§6.1).
//!
//! Every frame is a sequence of big-endian fields followed by a raw u16
//! that must equal the running CRC-16 accumulated over every prior byte
//! of the frame; the final CRC field itself is never folded into the
//! checksum it is being compared against.

use crate::crc::Crc16;
use crate::errors::WireError;
use uuid::Uuid;

/// Cap on a u8-length-prefixed string (§6.1).
pub const MAX_SHORT_LEN: usize = 255;
/// Cap on a u16-length-prefixed payload (§6.1).
pub const MAX_LONG_LEN: usize = 32_767;

/// Reads fields out of one frame's byte buffer while accumulating the
/// running CRC.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    crc: Crc16,
}

impl<'a> FrameReader<'a> {
    /// Begin reading a frame from `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            crc: Crc16::new(),
        }
    }

    /// Bytes remaining after the last read, useful before a length-capped
    /// tail read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::UnexpectedEof { field });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        self.crc.update(slice);
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.take(1, field)?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self, field: &'static str) -> Result<u16, WireError> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, WireError> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian u64.
    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, WireError> {
        let b = self.take(8, field)?;
        Ok(u64::from_be_bytes(b.try_into().expect("8 bytes")))
    }

    /// Read a u8-length-prefixed UTF-8 string, capped at
    /// [`MAX_SHORT_LEN`].
    pub fn read_string_u8(&mut self, field: &'static str) -> Result<String, WireError> {
        let len = self.read_u8(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 { field })
    }

    /// Read a u16-length-prefixed UTF-8 string, capped at
    /// [`MAX_LONG_LEN`] (e.g. the JWT opener's bearer token).
    pub fn read_string_u16(&mut self, field: &'static str) -> Result<String, WireError> {
        let len = self.read_u16(field)? as usize;
        if len > MAX_LONG_LEN {
            return Err(WireError::LengthExceeded { field, len, cap: MAX_LONG_LEN });
        }
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 { field })
    }

    /// Read a u16-length-prefixed byte payload, capped at
    /// [`MAX_LONG_LEN`].
    pub fn read_blob_u16(&mut self, field: &'static str) -> Result<Vec<u8>, WireError> {
        let len = self.read_u16(field)? as usize;
        if len > MAX_LONG_LEN {
            return Err(WireError::LengthExceeded { field, len, cap: MAX_LONG_LEN });
        }
        Ok(self.take(len, field)?.to_vec())
    }

    /// Read a fixed-length byte payload whose length was communicated out
    /// of band (e.g. a u8-prefixed pk/data tuple in §4.9's change frame).
    pub fn read_blob_exact(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, WireError> {
        Ok(self.take(len, field)?.to_vec())
    }

    /// Read a 36-byte canonical-text UUID.
    pub fn read_uuid_text(&mut self, field: &'static str) -> Result<Uuid, WireError> {
        let bytes = self.take(36, field)?;
        let s = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 { field })?;
        Uuid::parse_str(s).map_err(|_| WireError::InvalidUuid { field })
    }

    /// Read a 16-byte binary-form UUID.
    pub fn read_uuid_binary(&mut self, field: &'static str) -> Result<Uuid, WireError> {
        let bytes = self.take(16, field)?;
        Ok(Uuid::from_slice(bytes).expect("exactly 16 bytes"))
    }

    /// Read the trailing final CRC and check it against everything read
    /// so far.
    pub fn read_final_crc(&mut self) -> Result<(), WireError> {
        if self.pos + 2 > self.buf.len() {
            return Err(WireError::UnexpectedEof { field: "finalCRC" });
        }
        let expected = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        let computed = self.crc.value();
        if expected != computed {
            return Err(WireError::TransmissionError { expected, computed });
        }
        Ok(())
    }
}

/// Builds one frame's byte buffer while accumulating the running CRC,
/// mirroring [`FrameReader`].
#[derive(Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
    crc: Crc16,
}

impl FrameWriter {
    /// Start a new, empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&mut self, bytes: &[u8]) {
        self.crc.update(bytes);
        self.buf.extend_from_slice(bytes);
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    /// Write a big-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.put(&v.to_be_bytes());
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.put(&v.to_be_bytes());
    }

    /// Write a big-endian u64.
    pub fn write_u64(&mut self, v: u64) {
        self.put(&v.to_be_bytes());
    }

    /// Write a u8-length-prefixed UTF-8 string.
    pub fn write_string_u8(&mut self, s: &str) -> Result<(), WireError> {
        if s.len() > MAX_SHORT_LEN {
            return Err(WireError::LengthExceeded {
                field: "string",
                len: s.len(),
                cap: MAX_SHORT_LEN,
            });
        }
        self.write_u8(s.len() as u8);
        self.put(s.as_bytes());
        Ok(())
    }

    /// Write a u16-length-prefixed UTF-8 string.
    pub fn write_string_u16(&mut self, s: &str) -> Result<(), WireError> {
        if s.len() > MAX_LONG_LEN {
            return Err(WireError::LengthExceeded {
                field: "string",
                len: s.len(),
                cap: MAX_LONG_LEN,
            });
        }
        self.write_u16(s.len() as u16);
        self.put(s.as_bytes());
        Ok(())
    }

    /// Write a u16-length-prefixed byte payload.
    pub fn write_blob_u16(&mut self, data: &[u8]) -> Result<(), WireError> {
        if data.len() > MAX_LONG_LEN {
            return Err(WireError::LengthExceeded {
                field: "blob",
                len: data.len(),
                cap: MAX_LONG_LEN,
            });
        }
        self.write_u16(data.len() as u16);
        self.put(data);
        Ok(())
    }

    /// Write raw bytes whose length the reader will know out of band.
    pub fn write_blob_exact(&mut self, data: &[u8]) {
        self.put(data);
    }

    /// Write a UUID in 36-byte canonical text form.
    pub fn write_uuid_text(&mut self, uuid: Uuid) {
        self.put(uuid.hyphenated().to_string().as_bytes());
    }

    /// Write a UUID in 16-byte binary form.
    pub fn write_uuid_binary(&mut self, uuid: Uuid) {
        self.put(uuid.as_bytes());
    }

    /// Close the frame, appending the final CRC, and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let crc = self.crc.value();
        self.buf.extend_from_slice(&crc.to_be_bytes());
        self.buf
    }
}
