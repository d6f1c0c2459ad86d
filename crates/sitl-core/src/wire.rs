//! Datagram framing for the UDP bridge.
//!
//! Every datagram is `[2-byte id, host byte order][N-byte payload]` where N
//! must equal the registered wire size for that id. There is no handshake and
//! no acknowledgement at this layer; a datagram that fails any check is
//! discarded and the stream continues.

use crate::messages::MsgId;

/// Length of the id prefix on every datagram.
pub const ID_LEN: usize = std::mem::size_of::<u16>();

/// Receive buffer size. Comfortably larger than any registered payload.
pub const MAX_DATAGRAM: usize = 4096;

/// Default well-known port the bridge binds for the external driver.
pub const DEFAULT_PORT: u16 = 9000;

/// Serialize a frame: id prefix followed by the raw payload bytes.
pub fn encode_frame(id: MsgId, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ID_LEN + payload.len());
    frame.extend_from_slice(&(id as u16).to_ne_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Split a datagram into its raw id and payload bytes.
///
/// Returns `None` when the datagram is too short to carry an id — the one
/// unconditional discard rule. The id is NOT validated here; that is the
/// authorization path's job, which also checks the payload size.
pub fn split_frame(datagram: &[u8]) -> Option<(u16, &[u8])> {
    if datagram.len() < ID_LEN {
        return None;
    }
    let raw_id = u16::from_ne_bytes([datagram[0], datagram[1]]);
    Some((raw_id, &datagram[ID_LEN..]))
}
