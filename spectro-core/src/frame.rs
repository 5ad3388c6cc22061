//! Hex-encoded frame used by binary-payload instruments

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    constants::CR,
    error::{Error, Result},
};

/// Hex-encoded protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────┬──────────────────┬──────────────┬─────────┐
/// │  Start  │     Payload      │   Checksum   │   End   │
/// │  '#'    │  2N hex digits   │ 2 hex digits │   CR    │
/// └─────────┴──────────────────┴──────────────┴─────────┘
/// ```
///
/// Hex digits are upper case on output; either case is accepted on input.
///
/// # Examples
///
/// ```
/// use spectro_core::frame::HexFrame;
///
/// let frame = HexFrame::new(vec![0x10]);
/// let encoded = frame.encode();
/// assert_eq!(&encoded[..], b"#10EF\r");
///
/// let decoded = HexFrame::decode(&encoded).unwrap();
/// assert_eq!(decoded, frame);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct HexFrame {
    /// Binary payload (opcode and parameters, or status and data)
    pub payload: Bytes,
}

impl HexFrame {
    /// Start-of-frame marker
    pub const START: u8 = b'#';
    
    /// Create a frame around `payload`
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
    
    /// Calculate checksum for this frame
    pub fn checksum(&self) -> u8 {
        checksum::calculate(&self.payload)
    }
    
    /// Encode frame to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(2 * self.payload.len() + 4);
        
        buf.put_u8(Self::START);
        buf.put_slice(hex::encode_upper(&self.payload).as_bytes());
        buf.put_slice(hex::encode_upper([self.checksum()]).as_bytes());
        buf.put_u8(CR);
        
        buf
    }
    
    /// Decode frame from bytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The start marker is missing or the text is not valid hex
    /// - The frame holds no checksum byte
    /// - Checksum verification fails
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| Error::InvalidFrame(e.to_string()))?
            .trim();
        
        let body = text
            .strip_prefix(Self::START as char)
            .ok_or_else(|| Error::InvalidFrame(format!("missing start marker in {:?}", text)))?;
        
        let raw = hex::decode(body).map_err(|e| Error::InvalidFrame(e.to_string()))?;
        
        let Some((received, payload)) = raw.split_last() else {
            return Err(Error::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        };
        
        let frame = Self::new(Bytes::copy_from_slice(payload));
        
        let calculated = frame.checksum();
        if calculated != *received {
            return Err(Error::ChecksumMismatch {
                expected: calculated,
                received: *received,
            });
        }
        
        Ok(frame)
    }
}

impl fmt::Debug for HexFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HexFrame")
            .field("payload", &hex::encode_upper(&self.payload))
            .field("checksum", &format!("0x{:02X}", self.checksum()))
            .finish()
    }
}

impl fmt::Display for HexFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexFrame(len={})", self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    
    #[test]
    fn test_frame_encode() {
        let frame = HexFrame::new(vec![0x30, 0x01, 0x02]);
        assert_eq!(&frame.encode()[..], b"#300102CC\r");
    }
    
    #[test]
    fn test_frame_encode_decode() {
        let original = HexFrame::new(vec![0x00, 0xAB, 0xCD, 0xEF]);
        let decoded = HexFrame::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }
    
    #[test]
    fn test_frame_accepts_lower_case() {
        let decoded = HexFrame::decode(b"#300102cc\r\n").unwrap();
        assert_eq!(decoded.payload.as_ref(), &[0x30, 0x01, 0x02]);
    }
    
    #[test]
    fn test_frame_checksum_verification() {
        let result = HexFrame::decode(b"#300102CD\r");
        
        if let Err(Error::ChecksumMismatch { expected, received }) = result {
            assert_eq!(expected, 0xCC);
            assert_eq!(received, 0xCD);
        } else {
            panic!("Expected ChecksumMismatch error");
        }
    }
    
    #[test]
    fn test_frame_too_short() {
        assert!(matches!(
            HexFrame::decode(b"#\r"),
            Err(Error::FrameTooShort { .. })
        ));
    }
    
    #[test]
    fn test_frame_invalid_text() {
        assert!(matches!(HexFrame::decode(b"300102CC\r"), Err(Error::InvalidFrame(_))));
        assert!(matches!(HexFrame::decode(b"#3G\r"), Err(Error::InvalidFrame(_))));
        assert!(matches!(HexFrame::decode(b"#301\r"), Err(Error::InvalidFrame(_))));
    }
    
    #[test]
    fn test_frame_empty_payload() {
        let frame = HexFrame::new(Bytes::new());
        let encoded = frame.encode();
        assert_eq!(&encoded[..], b"#FF\r");
        assert_eq!(HexFrame::decode(&encoded).unwrap().payload.len(), 0);
    }
}
