//! PFCP Messages
//!
//! Messages are kept as a header plus their top level IEs. The N4 path only
//! routes on the message type and header SEID, so grouped IEs stay opaque.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PfcpError, PfcpResult};
use crate::header::{PfcpHeader, PfcpMessageType};

/// IE types (TS 29.244 8.1.2) looked at on the control path
pub mod ie_type {
    pub const CAUSE: u16 = 19;
    pub const F_SEID: u16 = 57;
    pub const NODE_ID: u16 = 60;
    pub const RECOVERY_TIME_STAMP: u16 = 96;
}

/// Raw top level IE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpIe {
    pub ie_type: u16,
    pub value: Bytes,
}

impl PfcpIe {
    pub fn new(ie_type: u16, value: impl Into<Bytes>) -> Self {
        Self {
            ie_type,
            value: value.into(),
        }
    }

    fn decode(buf: &mut Bytes) -> PfcpResult<Self> {
        if buf.remaining() < 4 {
            return Err(PfcpError::BufferTooShort {
                needed: 4,
                available: buf.remaining(),
            });
        }
        let ie_type = buf.get_u16();
        let length = buf.get_u16() as usize;
        if buf.remaining() < length {
            return Err(PfcpError::InvalidIeLength {
                expected: length,
                actual: buf.remaining(),
            });
        }
        Ok(Self {
            ie_type,
            value: buf.split_to(length),
        })
    }
}

/// Decoded PFCP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpMessage {
    pub header: PfcpHeader,
    pub ies: Vec<PfcpIe>,
}

impl PfcpMessage {
    pub fn new(header: PfcpHeader, ies: Vec<PfcpIe>) -> Self {
        Self { header, ies }
    }

    pub fn message_type(&self) -> PfcpMessageType {
        self.header.message_type
    }

    pub fn ie(&self, ie_type: u16) -> Option<&PfcpIe> {
        self.ies.iter().find(|ie| ie.ie_type == ie_type)
    }

    /// Cause value, for responses that carry one
    pub fn cause(&self) -> Option<u8> {
        self.ie(ie_type::CAUSE)
            .and_then(|ie| ie.value.first().copied())
    }

    /// Encode the message; the header length field is computed here
    pub fn encode(&self) -> BytesMut {
        let ies_len: usize = self.ies.iter().map(|ie| 4 + ie.value.len()).sum();
        let mut header = self.header.clone();
        header.length = (header.header_len() - 4 + ies_len) as u16;

        let mut buf = BytesMut::with_capacity(header.header_len() + ies_len);
        header.encode(&mut buf);
        for ie in &self.ies {
            buf.put_u16(ie.ie_type);
            buf.put_u16(ie.value.len() as u16);
            buf.put_slice(&ie.value);
        }
        buf
    }

    /// Decode a complete datagram
    pub fn decode(mut buf: Bytes) -> PfcpResult<Self> {
        let header = PfcpHeader::decode(&mut buf)?;

        let declared = (header.length as usize)
            .checked_sub(header.header_len() - 4)
            .ok_or(PfcpError::InvalidLength {
                declared: header.length as usize,
                actual: buf.remaining(),
            })?;
        if declared > buf.remaining() {
            return Err(PfcpError::InvalidLength {
                declared,
                actual: buf.remaining(),
            });
        }

        let mut payload = buf.split_to(declared);
        let mut ies = Vec::new();
        while payload.has_remaining() {
            ies.push(PfcpIe::decode(&mut payload)?);
        }
        Ok(Self { header, ies })
    }
}
