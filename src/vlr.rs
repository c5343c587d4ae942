//! Variable-Length Records (§3, §6): application-defined metadata
//! payloads addressed by `(userId, recordId)`, wire format adapted
//! directly from the LAS VLR concept named in §6.
//!
//! Wire layout, 64-byte fixed header followed by `payload_size` bytes:
//!
//! | field | width |
//! |-------|-------|
//! | userId (ASCII) | 16 |
//! | recordId | 4 |
//! | payloadSize | 4 |
//! | description (ASCII) | 32 |
//! | isPayloadText | 1 |
//! | reserved | 7 |
//! | payload | payloadSize |

use crate::error::{Error, Result};
use crate::io::primitives::{
    read_fixed_ascii, read_u32, read_u8, read_vec, write_fixed_ascii, write_u32, write_u8,
};

pub const USER_ID_WIDTH: usize = 16;
pub const DESCRIPTION_WIDTH: usize = 32;
pub const HEADER_LEN: usize = USER_ID_WIDTH + 4 + 4 + DESCRIPTION_WIDTH + 1 + 7;

/// Standard registry VLR identity (§4.9). The spec prose names the VLR
/// `"GvrsCompressionCodecs"` (21 characters), which does not fit the
/// 16-byte `userId` field; this repository shortens the on-wire userId
/// to `"GvrsCompression"` and carries the full name in `description`
/// instead (see `DESIGN.md`).
pub const CODEC_REGISTRY_USER_ID: &str = "GvrsCompression";
pub const CODEC_REGISTRY_RECORD_ID: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableLengthRecord {
    pub user_id: String,
    pub record_id: u32,
    pub description: String,
    pub is_text: bool,
    pub payload: Vec<u8>,
}

impl VariableLengthRecord {
    pub fn new(user_id: impl Into<String>, record_id: u32, payload: Vec<u8>) -> Result<Self> {
        Self::with_description(user_id, record_id, String::new(), false, payload)
    }

    pub fn with_description(
        user_id: impl Into<String>,
        record_id: u32,
        description: impl Into<String>,
        is_text: bool,
        payload: Vec<u8>,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.is_empty() || user_id.len() > USER_ID_WIDTH {
            return Err(Error::InvalidArgument(format!(
                "VLR userId must be 1-{} ASCII characters",
                USER_ID_WIDTH
            )));
        }
        if record_id > 0xFFFF {
            return Err(Error::InvalidArgument("VLR recordId must be in [0, 65535]".to_string()));
        }
        let description = description.into();
        if description.len() > DESCRIPTION_WIDTH {
            return Err(Error::InvalidArgument(format!(
                "VLR description must be at most {} ASCII characters",
                DESCRIPTION_WIDTH
            )));
        }
        Ok(Self {
            user_id,
            record_id,
            description,
            is_text,
            payload,
        })
    }

    pub fn identity(&self) -> (&str, u32) {
        (&self.user_id, self.record_id)
    }

    pub fn text_payload(&self) -> Option<&str> {
        if self.is_text {
            std::str::from_utf8(&self.payload).ok()
        } else {
            None
        }
    }

    /// Writes the fixed 64-byte header followed by the payload bytes.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_fixed_ascii(out, &self.user_id, USER_ID_WIDTH)?;
        write_u32(out, self.record_id)?;
        write_u32(out, self.payload.len() as u32)?;
        write_fixed_ascii(out, &self.description, DESCRIPTION_WIDTH)?;
        write_u8(out, u8::from(self.is_text))?;
        out.extend_from_slice(&[0u8; 7]);
        out.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Parses one VLR starting at `data[0]`; `data` must contain at
    /// least the full record (header + payload).
    pub fn read_from(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::FormatError("truncated VLR header".to_string()));
        }
        let mut cursor = std::io::Cursor::new(data);
        let user_id = read_fixed_ascii(&mut cursor, USER_ID_WIDTH)?;
        let record_id = read_u32(&mut cursor)?;
        let payload_size = read_u32(&mut cursor)? as usize;
        let description = read_fixed_ascii(&mut cursor, DESCRIPTION_WIDTH)?;
        let is_text = read_u8(&mut cursor)? != 0;
        let _reserved = read_vec(&mut cursor, 7)?;
        if data.len() < HEADER_LEN + payload_size {
            return Err(Error::FormatError("VLR payload overruns buffer".to_string()));
        }
        let payload = data[HEADER_LEN..HEADER_LEN + payload_size].to_vec();
        Ok(Self {
            user_id,
            record_id,
            description,
            is_text,
            payload,
        })
    }
}

/// Serializes the file's codec registry into the `GvrsCompressionCodecs`
/// VLR body (§4.9): one codec name per line, matching a LAS-style
/// "CSV-like list" text payload.
pub fn encode_codec_registry(names: &[&'static str]) -> VariableLengthRecord {
    let body = names.join("\n");
    VariableLengthRecord::with_description(
        CODEC_REGISTRY_USER_ID,
        CODEC_REGISTRY_RECORD_ID,
        "GvrsCompressionCodecs registry",
        true,
        body.into_bytes(),
    )
    .expect("codec registry VLR identity is always within field limits")
}

pub fn decode_codec_registry(vlr: &VariableLengthRecord) -> Result<Vec<String>> {
    let text = vlr
        .text_payload()
        .ok_or_else(|| Error::FormatError("codec registry VLR is not text".to_string()))?;
    Ok(text.lines().filter(|l| !l.is_empty()).map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlr_round_trip() {
        let vlr = VariableLengthRecord::with_description(
            "MyApp",
            42,
            "a sample record",
            false,
            vec![1, 2, 3, 4, 5],
        )
        .unwrap();
        let mut buf = Vec::new();
        vlr.write_to(&mut buf).unwrap();
        let back = VariableLengthRecord::read_from(&buf).unwrap();
        assert_eq!(back, vlr);
    }

    #[test]
    fn test_vlr_text_payload() {
        let vlr = VariableLengthRecord::with_description("App", 1, "", true, b"hello".to_vec()).unwrap();
        assert_eq!(vlr.text_payload(), Some("hello"));
    }

    #[test]
    fn test_vlr_rejects_oversized_user_id() {
        let result = VariableLengthRecord::new("a-user-id-that-is-too-long", 1, vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_codec_registry_round_trip() {
        let names = vec!["GvrsDeflate", "GvrsHuffman", "GvrsFloat"];
        let vlr = encode_codec_registry(&names);
        let decoded = decode_codec_registry(&vlr).unwrap();
        assert_eq!(decoded, names);
    }
}
