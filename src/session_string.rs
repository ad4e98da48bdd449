//! # Session String Encoding
//!
//! Serializes an authorized login into the portable string formats understood by
//! the supported client libraries.
//!
//! ```text
//! Telethon  "1" + base64url(padded)  [ dc_id:u8 | ip:4/16 | port:u16 | auth_key:256 ]
//! Pyrogram        base64url(no pad)  [ dc_id:u8 | api_id:u32 | test_mode:u8 | auth_key:256 | user_id:u64 | is_bot:u8 ]
//! ```
//!
//! All integers are big-endian.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::auth::SessionMaterial;
use crate::dialogue::SessionLibrary;

/// Version marker prepended to Telethon string sessions
pub const TELETHON_VERSION: char = '1';

/// Port used by every production data centre
pub const DC_PORT: u16 = 443;

/// Production data centre addresses keyed by DC id
const PRODUCTION_DCS: [(i32, Ipv4Addr); 5] = [
    (1, Ipv4Addr::new(149, 154, 175, 53)),
    (2, Ipv4Addr::new(149, 154, 167, 51)),
    (3, Ipv4Addr::new(149, 154, 175, 100)),
    (4, Ipv4Addr::new(149, 154, 167, 91)),
    (5, Ipv4Addr::new(91, 108, 56, 130)),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEncodingError {
    /// The DC id does not name a known production data centre
    UnknownDataCenter(i32),
    /// A field does not fit the width the format reserves for it
    FieldOutOfRange(&'static str),
}

impl fmt::Display for SessionEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEncodingError::UnknownDataCenter(id) => {
                write!(f, "unknown Telegram data centre {}", id)
            }
            SessionEncodingError::FieldOutOfRange(field) => {
                write!(f, "session field '{}' is out of range", field)
            }
        }
    }
}

impl std::error::Error for SessionEncodingError {}

/// Production address of a data centre
pub fn data_center_address(dc_id: i32) -> Option<SocketAddr> {
    PRODUCTION_DCS
        .iter()
        .find(|(id, _)| *id == dc_id)
        .map(|(_, ip)| SocketAddr::new(IpAddr::V4(*ip), DC_PORT))
}

fn dc_byte(dc_id: i32) -> Result<u8, SessionEncodingError> {
    u8::try_from(dc_id).map_err(|_| SessionEncodingError::FieldOutOfRange("dc_id"))
}

/// Encode a Telethon `StringSession`
pub fn encode_telethon(material: &SessionMaterial) -> Result<String, SessionEncodingError> {
    let addr = data_center_address(material.dc_id)
        .ok_or(SessionEncodingError::UnknownDataCenter(material.dc_id))?;

    let mut buf = Vec::with_capacity(1 + 16 + 2 + 256);
    buf.push(dc_byte(material.dc_id)?);
    match addr.ip() {
        IpAddr::V4(ip) => buf.extend_from_slice(&ip.octets()),
        IpAddr::V6(ip) => buf.extend_from_slice(&ip.octets()),
    }
    buf.extend_from_slice(&addr.port().to_be_bytes());
    buf.extend_from_slice(&material.auth_key);

    let mut out = String::with_capacity(1 + buf.len() * 4 / 3 + 4);
    out.push(TELETHON_VERSION);
    URL_SAFE.encode_string(&buf, &mut out);
    Ok(out)
}

/// Encode a Pyrogram session string
pub fn encode_pyrogram(material: &SessionMaterial) -> Result<String, SessionEncodingError> {
    let api_id =
        u32::try_from(material.api_id).map_err(|_| SessionEncodingError::FieldOutOfRange("api_id"))?;
    let user_id = u64::try_from(material.user_id)
        .map_err(|_| SessionEncodingError::FieldOutOfRange("user_id"))?;

    let mut buf = Vec::with_capacity(1 + 4 + 1 + 256 + 8 + 1);
    buf.push(dc_byte(material.dc_id)?);
    buf.extend_from_slice(&api_id.to_be_bytes());
    buf.push(u8::from(material.test_mode));
    buf.extend_from_slice(&material.auth_key);
    buf.extend_from_slice(&user_id.to_be_bytes());
    buf.push(u8::from(material.is_bot));

    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Encode `material` in the format of the chosen library
pub fn encode(
    library: SessionLibrary,
    material: &SessionMaterial,
) -> Result<String, SessionEncodingError> {
    match library {
        SessionLibrary::Pyrogram => encode_pyrogram(material),
        SessionLibrary::Telethon => encode_telethon(material),
    }
}
