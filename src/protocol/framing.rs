use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PgWireError, Result};

/// Protocol 3.0.
pub const PROTOCOL_VERSION: i32 = 196_608;

/// Upper bound on a single backend message; anything larger is treated as a corrupt stream.
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

/// tag (1) + length (4)
const HEADER_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct BackendMessage {
    pub tag: u8,
    pub payload: Bytes, // payload excludes the tag and the 4-byte length field
}

/// Reassembles backend messages from arbitrarily chunked socket reads.
///
/// Bytes are appended with [`MessageDecoder::push`] (or read directly into
/// [`MessageDecoder::buffer_mut`]); [`MessageDecoder::next_message`] yields a
/// message only once all of its declared length is buffered. Trailing bytes of
/// an incomplete message stay in the buffer until the next read.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buf: BytesMut,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Direct access for `AsyncReadExt::read_buf`.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of bytes buffered but not yet yielded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn next_message(&mut self) -> Result<Option<BackendMessage>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let tag = self.buf[0];
        let len = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        if len < 4 {
            return Err(PgWireError::Protocol(format!(
                "invalid backend message length: {len}"
            )));
        }
        let len = len as usize;
        if len > MAX_MESSAGE_LEN {
            return Err(PgWireError::Protocol(format!(
                "backend message too large: {len} bytes"
            )));
        }

        let total = 1 + len;
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return Ok(None);
        }

        let mut frame = self.buf.split_to(total);
        frame.advance(HEADER_LEN);
        Ok(Some(BackendMessage {
            tag,
            payload: frame.freeze(),
        }))
    }
}

fn encode_frame(tag: u8, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u8(tag);
    buf.put_i32(0);
    buf.extend_from_slice(body);

    let len = (buf.len() - 1) as i32;
    buf[1..5].copy_from_slice(&len.to_be_bytes());
    buf.freeze()
}

pub fn encode_startup(protocol_version: i32, params: &[(&str, &str)]) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_i32(0); // length placeholder
    buf.put_i32(protocol_version);

    for (k, v) in params {
        buf.extend_from_slice(k.as_bytes());
        buf.put_u8(0);
        buf.extend_from_slice(v.as_bytes());
        buf.put_u8(0);
    }
    buf.put_u8(0); // terminator

    let len = buf.len() as i32;
    buf[0..4].copy_from_slice(&len.to_be_bytes());
    buf.freeze()
}

/// Simple Query ('Q'): `sql` followed by NUL.
pub fn encode_query(sql: &str) -> Bytes {
    let mut body = Vec::with_capacity(sql.len() + 1);
    body.extend_from_slice(sql.as_bytes());
    body.push(0);
    encode_frame(b'Q', &body)
}

/// PasswordMessage ('p'): credential followed by NUL.
pub fn encode_password(credential: &str) -> Bytes {
    let mut body = Vec::with_capacity(credential.len() + 1);
    body.extend_from_slice(credential.as_bytes());
    body.push(0);
    encode_frame(b'p', &body)
}

/// CopyFail ('f'): aborts a COPY FROM STDIN the server has started.
pub fn encode_copy_fail(reason: &str) -> Bytes {
    let mut body = Vec::with_capacity(reason.len() + 1);
    body.extend_from_slice(reason.as_bytes());
    body.push(0);
    encode_frame(b'f', &body)
}

pub fn encode_terminate() -> Bytes {
    encode_frame(b'X', &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![tag];
        v.extend_from_slice(&((payload.len() + 4) as i32).to_be_bytes());
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn query_frame_decodes_back_to_text() {
        for sql in ["", "select 1", "select 'héllo wörld' as greeting"] {
            let frame = encode_query(sql);
            assert_eq!(frame.len(), 1 + 4 + sql.len() + 1);

            let declared = i32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
            assert_eq!(declared as usize, 4 + sql.len() + 1);

            let mut dec = MessageDecoder::new();
            dec.push(&frame);
            let msg = dec.next_message().unwrap().unwrap();
            assert_eq!(msg.tag, b'Q');
            let mut expected = sql.as_bytes().to_vec();
            expected.push(0);
            assert_eq!(&msg.payload[..], &expected[..]);
            assert_eq!(dec.buffered(), 0);
        }
    }

    #[test]
    fn password_frame_layout() {
        let frame = encode_password("md5abc");
        assert_eq!(&frame[..], b"p\x00\x00\x00\x0bmd5abc\x00");
    }

    #[test]
    fn copy_fail_frame_layout() {
        let frame = encode_copy_fail("no");
        assert_eq!(&frame[..], b"f\x00\x00\x00\x07no\x00");
    }

    #[test]
    fn terminate_is_five_bytes() {
        assert_eq!(&encode_terminate()[..], &[b'X', 0, 0, 0, 4]);
    }

    #[test]
    fn startup_layout() {
        let frame = encode_startup(PROTOCOL_VERSION, &[("user", "u"), ("database", "d")]);
        let body = b"user\0u\0database\0d\0\0";
        assert_eq!(frame.len(), 8 + body.len());
        assert_eq!(&frame[0..4], &(frame.len() as i32).to_be_bytes());
        assert_eq!(&frame[4..8], &196_608i32.to_be_bytes());
        assert_eq!(&frame[8..], body);
    }

    #[test]
    fn split_at_every_offset_yields_one_message() {
        let mut stream = backend(b'C', b"SELECT 1\0");
        let next = backend(b'Z', b"I");
        stream.extend_from_slice(&next);
        let first_len = stream.len() - next.len();

        for cut in 0..=first_len {
            let mut dec = MessageDecoder::new();
            dec.push(&stream[..cut]);
            if cut < first_len {
                assert!(dec.next_message().unwrap().is_none(), "cut at {cut}");
                dec.push(&stream[cut..first_len]);
            }
            let msg = dec.next_message().unwrap().unwrap();
            assert_eq!(msg.tag, b'C');
            assert_eq!(&msg.payload[..], b"SELECT 1\0");
            // nothing from the following message was consumed
            assert!(dec.next_message().unwrap().is_none());
            assert_eq!(dec.buffered(), 0);

            dec.push(&next);
            let z = dec.next_message().unwrap().unwrap();
            assert_eq!(z.tag, b'Z');
        }
    }

    #[test]
    fn several_messages_in_one_chunk() {
        let mut chunk = backend(b'S', b"TimeZone\0UTC\0");
        chunk.extend(backend(b'K', &[0, 0, 0, 7, 0, 0, 0, 9]));
        chunk.extend(backend(b'Z', b"I"));
        chunk.extend(&backend(b'C', b"SEL")[..4]); // partial trailing header

        let mut dec = MessageDecoder::new();
        dec.push(&chunk);
        let tags: Vec<u8> = std::iter::from_fn(|| dec.next_message().unwrap())
            .map(|m| m.tag)
            .collect();
        assert_eq!(tags, vec![b'S', b'K', b'Z']);
        assert_eq!(dec.buffered(), 4);
    }

    #[test]
    fn unknown_tag_is_framed_not_rejected() {
        let mut dec = MessageDecoder::new();
        dec.push(&backend(b'?', b"whatever"));
        let msg = dec.next_message().unwrap().unwrap();
        assert_eq!(msg.tag, b'?');
        assert_eq!(msg.payload.len(), 8);
    }

    #[test]
    fn rejects_length_below_four() {
        let mut dec = MessageDecoder::new();
        dec.push(&[b'Z', 0, 0, 0, 3]);
        let err = dec.next_message().unwrap_err();
        assert!(err.to_string().contains("invalid backend message length"));
    }

    #[test]
    fn rejects_negative_length() {
        let mut dec = MessageDecoder::new();
        dec.push(&[b'D', 0xff, 0xff, 0xff, 0xff]);
        assert!(dec.next_message().is_err());
    }

    #[test]
    fn rejects_oversized_length() {
        let mut dec = MessageDecoder::new();
        dec.push(&[b'D', 0x7f, 0xff, 0xff, 0xff]);
        let err = dec.next_message().unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
