use bytes::{Buf, BufMut, BytesMut};

use crate::{Command, CommandKind};

/// Header size on the wire: kind, correlation id, payload length.
pub const HEADER_LEN: usize = 12;

/// Ceiling on a declared payload length. A corrupt or hostile stream must
/// not be able to trigger an unbounded allocation.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("unrecognised command type {kind}")]
    MalformedHeader { kind: u32 },
    #[error("declared payload length {len} exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("payload body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Append the wire representation of `command` to `dst`. Infallible.
pub fn encode(command: &Command, dst: &mut BytesMut) {
    let payload = command.payload();
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(command.kind() as u32);
    dst.put_u32(command.id());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
}

/// Try to decode one command from the front of `src`.
///
/// Returns `Ok(None)` until the full declared payload has been received;
/// consumed bytes are split off `src` so the caller can keep appending.
pub fn decode(src: &mut BytesMut) -> Result<Option<Command>, CodecError> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = &src[..HEADER_LEN];
    let raw_kind = header.get_u32();
    let id = header.get_u32();
    let len = header.get_u32() as usize;

    let kind =
        CommandKind::from_u32(raw_kind).ok_or(CodecError::MalformedHeader { kind: raw_kind })?;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    if src.len() < HEADER_LEN + len {
        return Ok(None);
    }

    src.advance(HEADER_LEN);
    let payload = src.split_to(len).freeze();
    Ok(Some(Command::from_wire(kind, id, payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn roundtrip(command: Command) -> Command {
        let mut buf = BytesMut::new();
        encode(&command, &mut buf);
        let decoded = decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty(), "decode must consume the whole frame");
        decoded
    }

    #[test]
    fn empty_payload_roundtrip() {
        let original = Command::plain(CommandKind::StartConnection, 0);
        assert_eq!(roundtrip(original.clone()), original);
    }

    #[test]
    fn payload_roundtrip() {
        let original = Command::from_wire(
            CommandKind::EvalToVar,
            42,
            Bytes::from_static(b"{\"expression\":\"x\"}"),
        );
        let decoded = roundtrip(original.clone());
        assert_eq!(decoded.kind(), CommandKind::EvalToVar);
        assert_eq!(decoded.id(), 42);
        assert_eq!(decoded.payload(), original.payload());
    }

    #[test]
    fn maximum_payload_roundtrip() {
        let original = Command::from_wire(
            CommandKind::ValueString,
            7,
            Bytes::from(vec![0xabu8; MAX_PAYLOAD_LEN]),
        );
        assert_eq!(roundtrip(original.clone()), original);
    }

    #[test]
    fn partial_input_waits_for_more() {
        let mut buf = BytesMut::new();
        encode(
            &Command::from_wire(CommandKind::OutputLog, 1, Bytes::from_static(b"abcdef")),
            &mut buf,
        );

        let mut partial = BytesMut::from(&buf[..HEADER_LEN + 3]);
        assert!(decode(&mut partial).unwrap().is_none());
        // header must not have been consumed yet
        assert_eq!(partial.len(), HEADER_LEN + 3);

        partial.extend_from_slice(&buf[HEADER_LEN + 3..]);
        let decoded = decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.payload().as_ref(), b"abcdef");
    }

    #[test]
    fn short_header_waits_for_more() {
        let mut buf = BytesMut::from(&[0u8; HEADER_LEN - 1][..]);
        assert!(decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn two_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        encode(
            &Command::from_wire(CommandKind::Break, 1, Bytes::new()),
            &mut buf,
        );
        encode(
            &Command::from_wire(CommandKind::Resume, 2, Bytes::from_static(b"xy")),
            &mut buf,
        );

        let first = decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.kind(), CommandKind::Break);
        let second = decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.kind(), CommandKind::Resume);
        assert_eq!(second.payload().as_ref(), b"xy");
        assert!(decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let mut buf = BytesMut::new();
        buf.put_u32(9999);
        buf.put_u32(0);
        buf.put_u32(0);
        assert!(matches!(
            decode(&mut buf),
            Err(CodecError::MalformedHeader { kind: 9999 })
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(CommandKind::OutputLog as u32);
        buf.put_u32(0);
        buf.put_u32((MAX_PAYLOAD_LEN + 1) as u32);
        assert!(matches!(
            decode(&mut buf),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn header_fields_are_big_endian() {
        let mut buf = BytesMut::new();
        encode(&Command::plain(CommandKind::EndConnection, 0x0102_0304), &mut buf);
        assert_eq!(&buf[..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..8], &[1, 2, 3, 4]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 0]);
    }
}
