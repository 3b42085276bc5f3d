use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    io::{self, Cursor, Read},
};

use bytes::Bytes;

use crate::error::{Error, Result};

/// This trait exposes all of the information about a HTTP message that is required to
/// sign it and to re-derive its covered components during verification.
///
/// The [OwnedHttpMessage] type is provided for simple use cases where you do not have
/// preexisting structs representing HTTP messages. Support for the
/// [http](https://crates.io/crates/http) crate's `Request` and `Response` types can be
/// enabled with the `http` **feature**, which is off by default.
pub trait HttpMessage {
    /// The type of HTTP headers object.
    type Headers: Headers;

    /// The request method, or `None` for a response.
    fn method(&self) -> Option<&str>;

    /// The request target URI, absolute or origin-form. `None` for a response.
    fn target_uri(&self) -> Option<Cow<'_, str>>;

    /// The status code, or `None` for a request.
    fn status(&self) -> Option<u16>;

    /// Returns a shared reference to the HTTP headers.
    fn headers(&self) -> &Self::Headers;

    /// Returns a unique reference to the HTTP headers. This is used by
    /// [sign](crate::SignatureService::sign) to attach the signature headers.
    fn headers_mut(&mut self) -> &mut Self::Headers;

    /// The message body. Reading it through [MessageBody::snapshot] leaves it ready to
    /// be read again.
    fn body_mut(&mut self) -> &mut MessageBody;
}

/// This trait allows the signing logic both read and write access to the HTTP headers
/// contained within a [HTTP message](HttpMessage). Header names are case-insensitive.
pub trait Headers {
    /// Iterator over header values. Header values are allowed to be arbitrary byte
    /// strings in any encoding.
    type ValueIter<'a>: Iterator<Item = &'a [u8]>
    where
        Self: 'a;

    /// Returns true if the message contains a header with the given `name`.
    fn contains_header(&self, name: &str) -> bool;

    /// Returns an iterator over all the values present for the header with the given
    /// `name`.
    fn header_values(&self, name: &str) -> Self::ValueIter<'_>;

    /// Inserts a header with the given `name` and `value`, replacing any existing
    /// values.
    fn insert_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// All field lines for `name`, each trimmed and joined with `", "`. `None` if the
    /// header is absent.
    fn combined_value(&self, name: &str) -> Result<Option<String>> {
        let mut combined: Option<String> = None;
        for value in self.header_values(name) {
            let value = std::str::from_utf8(value)
                .map_err(|_| Error::invalid_input(name, "header value is not valid UTF-8"))?
                .trim();
            match combined.as_mut() {
                Some(combined) => {
                    combined.push_str(", ");
                    combined.push_str(value);
                }
                None => combined = Some(value.to_string()),
            }
        }
        Ok(combined)
    }
}

/// A message body that can be read for signing without being consumed.
#[derive(Default)]
pub enum MessageBody {
    #[default]
    Empty,
    /// Fully buffered, cheap to re-read.
    Buffered(Bytes),
    /// Single-pass reader. Replaced by [MessageBody::Buffered] once snapshotted.
    Stream(Box<dyn Read + Send>),
}

impl MessageBody {
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    /// Read the whole body and leave an equivalent re-readable body in its place.
    ///
    /// A stream is drained into memory and replaced by the buffered bytes. If reading
    /// fails part way, the bytes read so far are put back in front of the remaining
    /// stream so nothing is lost.
    pub fn snapshot(&mut self) -> io::Result<Bytes> {
        let mut reader = match std::mem::take(self) {
            Self::Empty => return Ok(Bytes::new()),
            Self::Buffered(bytes) => {
                *self = Self::Buffered(bytes.clone());
                return Ok(bytes);
            }
            Self::Stream(reader) => reader,
        };

        let mut buffer = Vec::new();
        match reader.read_to_end(&mut buffer) {
            Ok(_) => {
                let bytes = Bytes::from(buffer);
                *self = Self::Buffered(bytes.clone());
                Ok(bytes)
            }
            Err(err) => {
                *self = Self::Stream(Box::new(Cursor::new(buffer).chain(reader)));
                Err(err)
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(bytes).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for MessageBody {
    fn from(bytes: Bytes) -> Self {
        Self::Buffered(bytes)
    }
}

impl From<Vec<u8>> for MessageBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffered(bytes.into())
    }
}

impl From<&'static [u8]> for MessageBody {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Buffered(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for MessageBody {
    fn from(text: &'static str) -> Self {
        Self::Buffered(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for MessageBody {
    fn from(text: String) -> Self {
        Self::Buffered(text.into())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Start {
    Request { method: String, target_uri: String },
    Response { status: u16 },
}

/// This is a simple implementation of [HttpMessage] that does not depend on any
/// external library. It owns all of the message data.
#[derive(Debug)]
pub struct OwnedHttpMessage {
    start: Start,
    headers: BTreeMap<String, String>,
    body: MessageBody,
}

impl OwnedHttpMessage {
    pub fn request(method: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            start: Start::Request {
                method: method.into(),
                target_uri: target_uri.into(),
            },
            headers: BTreeMap::new(),
            body: MessageBody::Empty,
        }
    }

    pub fn response(status: u16) -> Self {
        Self {
            start: Start::Response { status },
            headers: BTreeMap::new(),
            body: MessageBody::Empty,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<MessageBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn set_target_uri(&mut self, uri: impl Into<String>) {
        if let Start::Request { target_uri, .. } = &mut self.start {
            *target_uri = uri.into();
        }
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }
}

impl HttpMessage for OwnedHttpMessage {
    type Headers = BTreeMap<String, String>;

    fn method(&self) -> Option<&str> {
        match &self.start {
            Start::Request { method, .. } => Some(method.as_str()),
            Start::Response { .. } => None,
        }
    }

    fn target_uri(&self) -> Option<Cow<'_, str>> {
        match &self.start {
            Start::Request { target_uri, .. } => Some(Cow::Borrowed(target_uri.as_str())),
            Start::Response { .. } => None,
        }
    }

    fn status(&self) -> Option<u16> {
        match self.start {
            Start::Request { .. } => None,
            Start::Response { status } => Some(status),
        }
    }

    fn headers(&self) -> &Self::Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Self::Headers {
        &mut self.headers
    }

    fn body_mut(&mut self) -> &mut MessageBody {
        &mut self.body
    }
}

/// Support for representing [Headers] as a [BTreeMap] keyed by lower-cased names.
mod btree_map {
    use crate::error::Result;

    impl super::Headers for std::collections::BTreeMap<String, String> {
        type ValueIter<'a> = ValueIter<'a>;

        fn contains_header(&self, name: &str) -> bool {
            self.contains_key(&name.to_ascii_lowercase())
        }

        fn header_values(&self, name: &str) -> Self::ValueIter<'_> {
            ValueIter {
                value: self.get(&name.to_ascii_lowercase()).map(String::as_bytes),
            }
        }

        fn insert_header(&mut self, name: &str, value: &str) -> Result<()> {
            self.insert(name.to_ascii_lowercase(), value.to_string());
            Ok(())
        }
    }

    pub struct ValueIter<'a> {
        value: Option<&'a [u8]>,
    }

    impl<'a> Iterator for ValueIter<'a> {
        type Item = &'a [u8];

        fn next(&mut self) -> Option<Self::Item> {
            self.value.take()
        }
    }
}

/// Adds support for using types from the [http](https://crates.io/crates/http) crate
/// as implementations of [HttpMessage] and [Headers].
///
/// Requires the `http` feature to be enabled.
#[cfg(feature = "http")]
mod http_crate {
    use std::borrow::Cow;

    use http::{header::HeaderName, HeaderMap, HeaderValue, Request, Response};

    use super::{HttpMessage, MessageBody};
    use crate::error::{Error, Result};

    impl HttpMessage for Request<MessageBody> {
        type Headers = HeaderMap;

        fn method(&self) -> Option<&str> {
            Some(Request::method(self).as_str())
        }

        fn target_uri(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Owned(Request::uri(self).to_string()))
        }

        fn status(&self) -> Option<u16> {
            None
        }

        fn headers(&self) -> &Self::Headers {
            Request::headers(self)
        }

        fn headers_mut(&mut self) -> &mut Self::Headers {
            Request::headers_mut(self)
        }

        fn body_mut(&mut self) -> &mut MessageBody {
            Request::body_mut(self)
        }
    }

    impl HttpMessage for Response<MessageBody> {
        type Headers = HeaderMap;

        fn method(&self) -> Option<&str> {
            None
        }

        fn target_uri(&self) -> Option<Cow<'_, str>> {
            None
        }

        fn status(&self) -> Option<u16> {
            Some(Response::status(self).as_u16())
        }

        fn headers(&self) -> &Self::Headers {
            Response::headers(self)
        }

        fn headers_mut(&mut self) -> &mut Self::Headers {
            Response::headers_mut(self)
        }

        fn body_mut(&mut self) -> &mut MessageBody {
            Response::body_mut(self)
        }
    }

    impl super::Headers for HeaderMap<HeaderValue> {
        type ValueIter<'a> = ValueIter<'a>;

        fn contains_header(&self, name: &str) -> bool {
            self.contains_key(name)
        }

        fn header_values(&self, name: &str) -> Self::ValueIter<'_> {
            ValueIter {
                iter: Some(self.get_all(name).into_iter()),
            }
        }

        fn insert_header(&mut self, name: &str, value: &str) -> Result<()> {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::invalid_input(name, "invalid header name"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| Error::invalid_input(name, "invalid header value"))?;
            self.insert(header_name, header_value);
            Ok(())
        }
    }

    pub struct ValueIter<'a> {
        iter: Option<http::header::ValueIter<'a, HeaderValue>>,
    }

    impl<'a> Iterator for ValueIter<'a> {
        type Item = &'a [u8];

        fn next(&mut self) -> Option<Self::Item> {
            self.iter
                .as_mut()
                .and_then(|iter| iter.next().map(HeaderValue::as_bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        io::{self, Read},
    };

    use super::{Headers, HttpMessage, MessageBody, OwnedHttpMessage};

    /// Yields some bytes, then fails once, then yields the rest.
    struct FlakyReader {
        chunks: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0)?;
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn snapshot_of_stream_is_re_readable() {
        let mut body = MessageBody::from_reader(io::Cursor::new(b"streamed".to_vec()));
        assert!(body.is_stream());

        assert_eq!(body.snapshot().unwrap(), &b"streamed"[..]);
        assert!(!body.is_stream());
        assert_eq!(body.snapshot().unwrap(), &b"streamed"[..]);
    }

    #[test]
    fn failed_snapshot_keeps_bytes_read_so_far() {
        let mut body = MessageBody::from_reader(FlakyReader {
            chunks: vec![
                Ok(b"abc".to_vec()),
                Err(io::Error::new(io::ErrorKind::Other, "boom")),
                Ok(b"def".to_vec()),
            ],
        });

        assert!(body.snapshot().is_err());
        assert_eq!(body.snapshot().unwrap(), &b"abcdef"[..]);
    }

    #[test]
    fn empty_and_buffered_bodies() {
        assert!(MessageBody::default().snapshot().unwrap().is_empty());
        let mut body = MessageBody::from("hello");
        assert_eq!(body.snapshot().unwrap(), &b"hello"[..]);
        assert_eq!(body.snapshot().unwrap(), &b"hello"[..]);
    }

    #[test]
    fn btree_headers_are_case_insensitive() {
        let mut headers = BTreeMap::new();
        headers.insert_header("Content-Type", "text/plain").unwrap();
        assert!(headers.contains_header("content-type"));
        assert!(headers.contains_header("CONTENT-TYPE"));
        assert_eq!(
            headers.combined_value("Content-type").unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(headers.combined_value("accept").unwrap(), None);
    }

    #[test]
    fn owned_message_accessors() {
        let request = OwnedHttpMessage::request("POST", "/foo").with_header("X-Foo", " bar ");
        assert_eq!(request.method(), Some("POST"));
        assert_eq!(request.target_uri().as_deref(), Some("/foo"));
        assert_eq!(request.status(), None);
        assert_eq!(request.header("x-foo"), Some(" bar "));
        assert_eq!(
            request.headers().combined_value("x-foo").unwrap().as_deref(),
            Some("bar")
        );

        let response = OwnedHttpMessage::response(404);
        assert_eq!(response.method(), None);
        assert_eq!(response.target_uri(), None);
        assert_eq!(response.status(), Some(404));
    }
}
