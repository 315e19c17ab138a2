// RCON wire format - Source-style length-prefixed packets, little-endian
//
// size:i32 | id:i32 | type:i32 | body bytes | 0x00 | 0x00
// `size` counts everything after itself.

use crate::rcon::RconError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server puts in its auth response when the password is wrong
pub const AUTH_FAILED_ID: i32 = -1;

const MIN_PACKET_SIZE: i32 = 10;
const MAX_PACKET_SIZE: i32 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn auth(id: i32, password: &str) -> Self {
        Self::new(id, SERVERDATA_AUTH, password)
    }

    pub fn exec(id: i32, command: &str) -> Self {
        Self::new(id, SERVERDATA_EXECCOMMAND, command)
    }

    /// Frame the packet. A body with an embedded NUL or one that would exceed
    /// the maximum packet size cannot be framed and is a `Protocol` error.
    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let body = self.body.as_bytes();
        if body.contains(&0) {
            return Err(RconError::Protocol("packet body contains a NUL byte".to_string()));
        }
        if body.len() > (MAX_PACKET_SIZE - MIN_PACKET_SIZE) as usize {
            return Err(RconError::Protocol(format!(
                "packet body of {} bytes exceeds the maximum packet size",
                body.len()
            )));
        }
        let size = (body.len() + MIN_PACKET_SIZE as usize) as i32;

        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.encode()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Packet, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let size = reader.read_i32_le().await?;
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::Protocol(format!("invalid packet size {}", size)));
        }

        let mut payload = vec![0u8; size as usize];
        reader.read_exact(&mut payload).await?;

        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

        // Body runs up to the first terminator; anything after it is padding
        let body = &payload[8..];
        let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
        let body = String::from_utf8_lossy(&body[..end]).to_string();

        Ok(Packet { id, kind, body })
    }
}
