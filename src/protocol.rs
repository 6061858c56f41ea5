//! # Wire Protocol
//!
//! Byte-exact encoding of [`SyncEvent`]s into single UDP datagrams:
//!
//! ```text
//! CREATE|<filename>|<raw file bytes>
//! DELETE|<filename>
//! ```
//!
//! Only the header is split on the delimiter. The content of a `CREATE`
//! message starts at a fixed offset computed from the header, so file bytes
//! that happen to contain `|` are carried through untouched.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::event::SyncEvent;

/// Separator between header fields. Never allowed inside a filename.
pub const DELIMITER: u8 = b'|';

/// Largest UDP payload that fits in one IPv4 datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const CREATE: &[u8] = b"CREATE";
const DELETE: &[u8] = b"DELETE";

/// Encode an event into one datagram payload.
///
/// Fails if the filename is not transmittable or if the resulting message
/// would not fit in a single datagram. Large files are never split.
pub fn encode(event: &SyncEvent) -> Result<Bytes, ProtocolError> {
    validate_filename(event.filename())?;

    let message = match event {
        SyncEvent::Create { filename, content } => {
            let size = CREATE.len() + 1 + filename.len() + 1 + content.len();
            if !fits_in_datagram(filename, content.len() as u64) {
                return Err(ProtocolError::PayloadTooLarge {
                    size,
                    limit: MAX_DATAGRAM_SIZE,
                });
            }
            let mut buf = BytesMut::with_capacity(size);
            buf.put_slice(CREATE);
            buf.put_u8(DELIMITER);
            buf.put_slice(filename.as_bytes());
            buf.put_u8(DELIMITER);
            buf.put_slice(content);
            buf
        }
        SyncEvent::Delete { filename } => {
            let mut buf = BytesMut::with_capacity(DELETE.len() + 1 + filename.len());
            buf.put_slice(DELETE);
            buf.put_u8(DELIMITER);
            buf.put_slice(filename.as_bytes());
            buf
        }
    };

    Ok(message.freeze())
}

/// Size of the `CREATE` message for a file of `content_len` bytes.
pub fn create_message_len(filename: &str, content_len: u64) -> u64 {
    (CREATE.len() + 1 + filename.len() + 1) as u64 + content_len
}

/// Whether a file of `content_len` bytes can be announced at all.
pub fn fits_in_datagram(filename: &str, content_len: u64) -> bool {
    create_message_len(filename, content_len) <= MAX_DATAGRAM_SIZE as u64
}

/// Decode one datagram payload.
///
/// The returned `Create` content is a zero-copy slice of `message`.
pub fn decode(message: Bytes) -> Result<SyncEvent, ProtocolError> {
    let command_end = find_delimiter(&message).unwrap_or(message.len());
    let command = &message[..command_end];

    if command != CREATE && command != DELETE {
        let shown = &command[..command.len().min(16)];
        return Err(ProtocolError::UnknownCommand(
            String::from_utf8_lossy(shown).into_owned(),
        ));
    }
    if command_end == message.len() {
        return Err(ProtocolError::MissingField("filename"));
    }

    let rest = &message[command_end + 1..];

    if command == DELETE {
        let filename = filename_from(rest)?;
        return Ok(SyncEvent::Delete { filename });
    }

    let name_len = find_delimiter(rest).ok_or(ProtocolError::MissingField("content"))?;
    let filename = filename_from(&rest[..name_len])?;
    let content_start = CREATE.len() + 1 + name_len + 1;

    Ok(SyncEvent::Create {
        filename,
        content: message.slice(content_start..),
    })
}

/// Check that a filename can be carried on the wire and applied locally.
///
/// Filenames are bare names inside the sync directory: no delimiter, no path
/// separators, no NUL, and not `.` or `..`.
pub fn validate_filename(name: &str) -> Result<(), ProtocolError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name
            .bytes()
            .any(|b| b == DELIMITER || b == b'/' || b == b'\\' || b == 0);

    if bad {
        return Err(ProtocolError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == DELIMITER)
}

fn filename_from(raw: &[u8]) -> Result<String, ProtocolError> {
    let name = std::str::from_utf8(raw).map_err(|_| ProtocolError::NonUtf8Filename)?;
    validate_filename(name)?;
    Ok(name.to_string())
}
