//! Gx Interface - PCEF <-> PCRF (3GPP TS 29.212)
//!
//! Only the fields the SMF dispatcher routes on are lifted out of the
//! Diameter message: command code, request bit, Result-Code, CC-Request-Type
//! and Session-Id.

use bytes::Bytes;

use crate::error::{result_code, DiameterError, DiameterResult};
use crate::message::{avp_code, Avp, DiameterHeader, DiameterMessage, cmd_flags};

/// Gx Application ID (3GPP TS 29.212)
pub const GX_APPLICATION_ID: u32 = 16777238;

/// Gx Command Codes
pub mod cmd {
    /// Credit-Control-Request/Answer
    pub const CREDIT_CONTROL: u32 = 272;
    /// Re-Auth-Request/Answer
    pub const RE_AUTH: u32 = 258;
}

/// Gx AVP Codes
pub mod avp {
    pub const CC_REQUEST_NUMBER: u32 = 415;
    pub const CC_REQUEST_TYPE: u32 = 416;
}

/// CC-Request-Type (RFC 4006 8.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CcRequestType {
    InitialRequest = 1,
    UpdateRequest = 2,
    TerminationRequest = 3,
    EventRequest = 4,
}

impl TryFrom<u32> for CcRequestType {
    type Error = DiameterError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::InitialRequest),
            2 => Ok(Self::UpdateRequest),
            3 => Ok(Self::TerminationRequest),
            4 => Ok(Self::EventRequest),
            _ => Err(DiameterError::InvalidAvpValue(format!(
                "CC-Request-Type {value}"
            ))),
        }
    }
}

/// What a Gx message is, from the SMF's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GxCommand {
    CreditControlAnswer,
    ReAuthRequest,
    /// Anything the SMF does not expect to receive
    Other { command_code: u32, request: bool },
}

/// Decoded Gx message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GxMessage {
    pub cmd_code: u32,
    pub request: bool,
    pub result_code: Option<u32>,
    pub cc_request_type: Option<CcRequestType>,
    pub session_id: Option<String>,
}

impl GxMessage {
    /// Credit-Control-Answer, as the PCRF would send it
    pub fn cca(session_id: &str, cc_request_type: CcRequestType, result_code: u32) -> Self {
        Self {
            cmd_code: cmd::CREDIT_CONTROL,
            request: false,
            result_code: Some(result_code),
            cc_request_type: Some(cc_request_type),
            session_id: Some(session_id.to_string()),
        }
    }

    /// Re-Auth-Request, as the PCRF would send it
    pub fn rar(session_id: &str) -> Self {
        Self {
            cmd_code: cmd::RE_AUTH,
            request: true,
            result_code: None,
            cc_request_type: None,
            session_id: Some(session_id.to_string()),
        }
    }

    pub fn command(&self) -> GxCommand {
        match (self.cmd_code, self.request) {
            (cmd::CREDIT_CONTROL, false) => GxCommand::CreditControlAnswer,
            (cmd::RE_AUTH, true) => GxCommand::ReAuthRequest,
            (command_code, request) => GxCommand::Other {
                command_code,
                request,
            },
        }
    }

    /// Only DIAMETER_SUCCESS counts; a missing Result-Code does not
    pub fn is_success(&self) -> bool {
        self.result_code == Some(result_code::DIAMETER_SUCCESS)
    }

    pub fn from_diameter(msg: &DiameterMessage) -> DiameterResult<Self> {
        let result_code = msg
            .find_avp(avp_code::RESULT_CODE)
            .map(Avp::as_u32)
            .transpose()?;
        let cc_request_type = msg
            .find_avp(avp::CC_REQUEST_TYPE)
            .map(|a| a.as_u32().and_then(CcRequestType::try_from))
            .transpose()?;
        Ok(Self {
            cmd_code: msg.header.command_code,
            request: msg.header.is_request(),
            result_code,
            cc_request_type,
            session_id: msg.session_id().map(str::to_string),
        })
    }

    pub fn to_diameter(&self) -> DiameterMessage {
        let mut flags = cmd_flags::PROXIABLE;
        if self.request {
            flags |= cmd_flags::REQUEST;
        }
        let mut avps = Vec::new();
        if let Some(ref sid) = self.session_id {
            avps.push(Avp::new(avp_code::SESSION_ID, sid.clone().into_bytes()));
        }
        if let Some(code) = self.result_code {
            avps.push(Avp::unsigned32(avp_code::RESULT_CODE, code));
        }
        if let Some(t) = self.cc_request_type {
            avps.push(Avp::unsigned32(avp::CC_REQUEST_TYPE, t as u32));
        }
        DiameterMessage::new(
            DiameterHeader {
                flags,
                command_code: self.cmd_code,
                application_id: GX_APPLICATION_ID,
                hop_by_hop_id: 0,
                end_to_end_id: 0,
            },
            avps,
        )
    }

    pub fn decode(buf: Bytes) -> DiameterResult<Self> {
        Self::from_diameter(&DiameterMessage::decode(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cca_round_trip() {
        let cca = GxMessage::cca(
            "smf.localdomain;1;1",
            CcRequestType::InitialRequest,
            result_code::DIAMETER_SUCCESS,
        );
        let decoded = GxMessage::decode(cca.to_diameter().encode().freeze()).unwrap();
        assert_eq!(decoded, cca);
        assert_eq!(decoded.command(), GxCommand::CreditControlAnswer);
        assert!(decoded.is_success());
    }

    #[test]
    fn test_rar_is_request() {
        let rar = GxMessage::rar("smf.localdomain;1;2");
        let raw = rar.to_diameter().encode();
        assert_eq!(raw[4] & cmd_flags::REQUEST, cmd_flags::REQUEST);
        assert_eq!(GxMessage::decode(raw.freeze()).unwrap().command(), GxCommand::ReAuthRequest);
    }

    #[test]
    fn test_ccr_is_not_an_answer() {
        let mut ccr = GxMessage::cca("s", CcRequestType::InitialRequest, 2001);
        ccr.request = true;
        assert_eq!(
            ccr.command(),
            GxCommand::Other {
                command_code: cmd::CREDIT_CONTROL,
                request: true
            }
        );
    }

    #[test]
    fn test_limited_success_is_not_success() {
        let cca = GxMessage::cca(
            "s",
            CcRequestType::TerminationRequest,
            result_code::DIAMETER_LIMITED_SUCCESS,
        );
        assert!(!cca.is_success());
    }

    #[test]
    fn test_unknown_request_type() {
        let mut msg = GxMessage::rar("s").to_diameter();
        msg.avps.push(Avp::unsigned32(avp::CC_REQUEST_TYPE, 9));
        assert!(matches!(
            GxMessage::from_diameter(&msg),
            Err(DiameterError::InvalidAvpValue(_))
        ));
    }

    #[test]
    fn test_session_id_padding() {
        // 5 octet Session-Id forces 3 octets of AVP padding
        let cca = GxMessage::cca("abcde", CcRequestType::UpdateRequest, 2001);
        let raw = cca.to_diameter().encode();
        assert_eq!(raw.len() % 4, 0);
        assert_eq!(
            GxMessage::decode(raw.freeze()).unwrap().session_id.as_deref(),
            Some("abcde")
        );
    }
}
