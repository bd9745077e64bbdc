//! Diameter Message
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Version    |                 Message Length                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | command flags |                  Command-Code                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Application-ID                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Hop-by-Hop Identifier                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      End-to-End Identifier                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DiameterError, DiameterResult};
use crate::DIAMETER_VERSION;

pub const DIAMETER_HEADER_SIZE: usize = 20;

const AVP_HEADER_SIZE: usize = 8;
const AVP_FLAG_VENDOR: u8 = 0x80;
const AVP_FLAG_MANDATORY: u8 = 0x40;

/// Command flags
pub mod cmd_flags {
    pub const REQUEST: u8 = 0x80;
    pub const PROXIABLE: u8 = 0x40;
    pub const ERROR: u8 = 0x20;
}

/// Base protocol AVP codes
pub mod avp_code {
    pub const SESSION_ID: u32 = 263;
    pub const RESULT_CODE: u32 = 268;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiameterHeader {
    pub flags: u8,
    pub command_code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

impl DiameterHeader {
    pub fn is_request(&self) -> bool {
        self.flags & cmd_flags::REQUEST != 0
    }
}

/// One AVP; grouped AVPs are left undecoded in `data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub flags: u8,
    pub vendor_id: Option<u32>,
    pub data: Bytes,
}

impl Avp {
    pub fn new(code: u32, data: impl Into<Bytes>) -> Self {
        Self {
            code,
            flags: AVP_FLAG_MANDATORY,
            vendor_id: None,
            data: data.into(),
        }
    }

    pub fn unsigned32(code: u32, value: u32) -> Self {
        Self::new(code, value.to_be_bytes().to_vec())
    }

    pub fn as_u32(&self) -> DiameterResult<u32> {
        let raw: [u8; 4] = self.data.as_ref().try_into().map_err(|_| {
            DiameterError::InvalidAvpValue(format!(
                "AVP {} is {} octets, expected 4",
                self.code,
                self.data.len()
            ))
        })?;
        Ok(u32::from_be_bytes(raw))
    }

    fn header_len(&self) -> usize {
        if self.vendor_id.is_some() {
            AVP_HEADER_SIZE + 4
        } else {
            AVP_HEADER_SIZE
        }
    }

    fn padded_len(&self) -> usize {
        (self.header_len() + self.data.len() + 3) & !3
    }

    fn encode(&self, buf: &mut BytesMut) {
        let len = self.header_len() + self.data.len();
        let flags = match self.vendor_id {
            Some(_) => self.flags | AVP_FLAG_VENDOR,
            None => self.flags & !AVP_FLAG_VENDOR,
        };
        buf.put_u32(self.code);
        buf.put_u32((u32::from(flags) << 24) | (len as u32 & 0x00ff_ffff));
        if let Some(vendor) = self.vendor_id {
            buf.put_u32(vendor);
        }
        buf.put_slice(&self.data);
        buf.put_bytes(0, self.padded_len() - len);
    }

    fn decode(buf: &mut Bytes) -> DiameterResult<Self> {
        if buf.remaining() < AVP_HEADER_SIZE {
            return Err(DiameterError::BufferTooSmall {
                needed: AVP_HEADER_SIZE,
                available: buf.remaining(),
            });
        }
        let code = buf.get_u32();
        let word = buf.get_u32();
        let flags = (word >> 24) as u8;
        let len = (word & 0x00ff_ffff) as usize;

        let header_len = if flags & AVP_FLAG_VENDOR != 0 {
            AVP_HEADER_SIZE + 4
        } else {
            AVP_HEADER_SIZE
        };
        if len < header_len {
            return Err(DiameterError::InvalidAvp(format!(
                "AVP {code} length {len} is shorter than its header"
            )));
        }
        if buf.remaining() < len - AVP_HEADER_SIZE {
            return Err(DiameterError::BufferTooSmall {
                needed: len - AVP_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        let vendor_id = (header_len > AVP_HEADER_SIZE).then(|| buf.get_u32());
        let data = buf.split_to(len - header_len);
        // The final AVP may omit its padding
        let padding = ((len + 3) & !3) - len;
        buf.advance(padding.min(buf.remaining()));

        Ok(Self {
            code,
            flags,
            vendor_id,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiameterMessage {
    pub header: DiameterHeader,
    pub avps: Vec<Avp>,
}

impl DiameterMessage {
    pub fn new(header: DiameterHeader, avps: Vec<Avp>) -> Self {
        Self { header, avps }
    }

    pub fn find_avp(&self, code: u32) -> Option<&Avp> {
        self.avps.iter().find(|avp| avp.code == code)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.find_avp(avp_code::SESSION_ID)
            .and_then(|avp| std::str::from_utf8(&avp.data).ok())
    }

    pub fn encode(&self) -> BytesMut {
        let len = DIAMETER_HEADER_SIZE + self.avps.iter().map(Avp::padded_len).sum::<usize>();
        let mut buf = BytesMut::with_capacity(len);
        buf.put_u32((u32::from(DIAMETER_VERSION) << 24) | (len as u32 & 0x00ff_ffff));
        buf.put_u32((u32::from(self.header.flags) << 24) | (self.header.command_code & 0x00ff_ffff));
        buf.put_u32(self.header.application_id);
        buf.put_u32(self.header.hop_by_hop_id);
        buf.put_u32(self.header.end_to_end_id);
        for avp in &self.avps {
            avp.encode(&mut buf);
        }
        buf
    }

    pub fn decode(mut buf: Bytes) -> DiameterResult<Self> {
        if buf.remaining() < DIAMETER_HEADER_SIZE {
            return Err(DiameterError::BufferTooSmall {
                needed: DIAMETER_HEADER_SIZE,
                available: buf.remaining(),
            });
        }
        let word = buf.get_u32();
        let version = (word >> 24) as u8;
        if version != DIAMETER_VERSION {
            return Err(DiameterError::UnsupportedVersion(version));
        }
        let len = (word & 0x00ff_ffff) as usize;
        if len < DIAMETER_HEADER_SIZE || len - 4 > buf.remaining() {
            return Err(DiameterError::InvalidMessageLength(len));
        }

        let word = buf.get_u32();
        let header = DiameterHeader {
            flags: (word >> 24) as u8,
            command_code: word & 0x00ff_ffff,
            application_id: buf.get_u32(),
            hop_by_hop_id: buf.get_u32(),
            end_to_end_id: buf.get_u32(),
        };

        let mut payload = buf.split_to(len - DIAMETER_HEADER_SIZE);
        let mut avps = Vec::new();
        while payload.has_remaining() {
            avps.push(Avp::decode(&mut payload)?);
        }
        Ok(Self { header, avps })
    }
}
