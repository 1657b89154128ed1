//! RESP2 values.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::Error;

/// A single RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`
    Error(String),
    /// `:1`
    Integer(i64),
    /// `$3\r\nfoo`
    Bulk(Bytes),
    /// `*2\r\n...`
    Array(Vec<Value>),
    /// `$-1` or `*-1`
    Nil,
}

impl Value {
    /// Decode one value from the front of the buffer, if it's complete.
    /// Consumed bytes are removed from the buffer.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Value>, Error> {
        match decode_at(buf, 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Write this value in wire format.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Simple(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Value::Error(s) => {
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Value::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Value::Bulk(bytes) => encode_bulk(bytes, buf),
            Value::Array(values) => {
                buf.put_u8(b'*');
                buf.put_slice(values.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for value in values {
                    value.encode(buf);
                }
            }
            Value::Nil => buf.put_slice(b"$-1\r\n"),
        }
    }

    /// The value is a nil reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Integer reply.
    pub fn integer(self, command: &'static str) -> Result<i64, Error> {
        match self {
            Value::Integer(i) => Ok(i),
            _ => Err(Error::UnexpectedReply(command)),
        }
    }

    /// Bulk string reply, `None` if nil.
    pub fn bulk(self, command: &'static str) -> Result<Option<Bytes>, Error> {
        match self {
            Value::Bulk(bytes) => Ok(Some(bytes)),
            Value::Nil => Ok(None),
            _ => Err(Error::UnexpectedReply(command)),
        }
    }

    /// Array of bulk strings.
    pub fn bulks(self, command: &'static str) -> Result<Vec<Bytes>, Error> {
        match self {
            Value::Array(values) => values
                .into_iter()
                .map(|value| match value {
                    Value::Bulk(bytes) => Ok(bytes),
                    _ => Err(Error::UnexpectedReply(command)),
                })
                .collect(),
            Value::Nil => Ok(vec![]),
            _ => Err(Error::UnexpectedReply(command)),
        }
    }

    /// `+OK` status reply.
    pub fn ok(self, command: &'static str) -> Result<(), Error> {
        match self {
            Value::Simple(status) if status.eq_ignore_ascii_case("OK") => Ok(()),
            _ => Err(Error::UnexpectedReply(command)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Bulk(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bulk(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

pub(crate) fn encode_bulk(bytes: &[u8], buf: &mut BytesMut) {
    buf.put_u8(b'$');
    buf.put_slice(bytes.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(bytes);
    buf.put_slice(b"\r\n");
}

/// Find the line starting at `pos`, returning it without the CRLF
/// and the position right after the CRLF.
fn line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], pos + end + 2))
}

fn int(line: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("bad integer {:?}", String::from_utf8_lossy(line))))
}

fn text(line: &[u8]) -> Result<String, Error> {
    String::from_utf8(line.to_vec()).map_err(|_| Error::Protocol("invalid utf-8".into()))
}

fn decode_at(buf: &[u8], pos: usize) -> Result<Option<(Value, usize)>, Error> {
    let Some(&tag) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = line(buf, pos + 1) else {
        return Ok(None);
    };

    match tag {
        b'+' => Ok(Some((Value::Simple(text(line)?), next))),
        b'-' => Ok(Some((Value::Error(text(line)?), next))),
        b':' => Ok(Some((Value::Integer(int(line)?), next))),
        b'$' => {
            let len = int(line)?;
            if len < 0 {
                return Ok(Some((Value::Nil, next)));
            }
            let len = len as usize;
            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(Error::Protocol("bulk string not terminated".into()));
            }
            Ok(Some((Value::Bulk(Bytes::copy_from_slice(&buf[next..end])), end + 2)))
        }
        b'*' => {
            let len = int(line)?;
            if len < 0 {
                return Ok(Some((Value::Nil, next)));
            }
            let mut values = Vec::with_capacity((len as usize).min(1024));
            let mut cursor = next;
            for _ in 0..len {
                match decode_at(buf, cursor)? {
                    Some((value, after)) => {
                        values.push(value);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Value::Array(values), cursor)))
        }
        other => Err(Error::Protocol(format!(
            "unknown reply type '{}'",
            other as char
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(input: &[u8]) -> Option<Value> {
        let mut buf = BytesMut::from(input);
        Value::decode(&mut buf).unwrap()
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(b"+OK\r\n"), Some(Value::Simple("OK".into())));
        assert_eq!(
            decode(b"-WRONGTYPE bad\r\n"),
            Some(Value::Error("WRONGTYPE bad".into()))
        );
        assert_eq!(decode(b":-42\r\n"), Some(Value::Integer(-42)));
        assert_eq!(decode(b"$-1\r\n"), Some(Value::Nil));
        assert_eq!(decode(b"*-1\r\n"), Some(Value::Nil));
        assert_eq!(decode(b"$0\r\n\r\n"), Some(Value::Bulk(Bytes::new())));
    }

    #[test]
    fn test_decode_nested_array() {
        let value = decode(b"*2\r\n$1\r\nq\r\n*1\r\n:7\r\n").unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::from("q"),
                Value::Array(vec![Value::Integer(7)])
            ])
        );
    }

    #[test]
    fn test_decode_partial() {
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);
        assert_eq!(Value::decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 7);

        buf.extend_from_slice(b"lo\r\n:1\r\n");
        assert_eq!(Value::decode(&mut buf).unwrap(), Some(Value::from("hello")));
        assert_eq!(Value::decode(&mut buf).unwrap(), Some(Value::Integer(1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_binary_bulk() {
        let value = decode(b"$4\r\n\r\n\x00\xff\r\n").unwrap();
        assert_eq!(value, Value::Bulk(Bytes::from_static(b"\r\n\x00\xff")));
    }

    #[test]
    fn test_decode_errors() {
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert!(Value::decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"$2\r\nabcd\r\n"[..]);
        assert!(Value::decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b":abc\r\n"[..]);
        assert!(Value::decode(&mut buf).is_err());
    }

    #[test]
    fn test_encode() {
        let mut buf = BytesMut::new();
        Value::Array(vec![
            Value::Simple("OK".into()),
            Value::Integer(3),
            Value::from("ab"),
            Value::Nil,
        ])
        .encode(&mut buf);
        assert_eq!(&buf[..], b"*4\r\n+OK\r\n:3\r\n$2\r\nab\r\n$-1\r\n");
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Value::Integer(2).integer("LLEN").unwrap(), 2);
        assert!(Value::Nil.integer("LLEN").is_err());
        assert_eq!(Value::Nil.bulk("GET").unwrap(), None);
        assert!(Value::Simple("OK".into()).ok("SET").is_ok());
        assert!(Value::Simple("QUEUED".into()).ok("SET").is_err());
        assert_eq!(
            Value::Array(vec![Value::from("a"), Value::from("b")])
                .bulks("LRANGE")
                .unwrap(),
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
        );
        assert!(Value::Array(vec![Value::Integer(1)]).bulks("LRANGE").is_err());
    }
}
