/// Minimal HTTP/1.1 request reading and response writing
///
/// One request per connection, `Connection: close` on every response.
/// Only what the wake-time endpoint needs: request line, headers and a
/// body framed by Content-Length or `Transfer-Encoding: chunked`.

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on request line + headers
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

const READ_CHUNK: usize = 1024;

/// Upper bound on a single chunk-size or trailer line
const MAX_CHUNK_LINE: usize = 1024;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("request body of {0} bytes exceeds limit")]
    BodyTooLarge(usize),
    #[error("request head too large")]
    HeadTooLarge,
    #[error("connection closed mid-request")]
    Truncated,
    #[error("unsupported transfer coding: {0}")]
    UnsupportedEncoding(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path without query string
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one request. Returns Ok(None) if the peer closed before sending anything.
pub async fn read_request<R>(reader: &mut R, max_body: usize) -> Result<Option<Request>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(RequestError::HeadTooLarge);
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(RequestError::Truncated);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| RequestError::Malformed("request head is not UTF-8"))?;
    let (method, path, headers) = parse_head(head)?;

    let pending = buf.split_off(head_end + 4);
    let body = match body_framing(&headers)? {
        Framing::Chunked => read_chunked(reader, pending, max_body).await?,
        Framing::Length(len) => read_sized(reader, pending, len, max_body).await?,
    };

    Ok(Some(Request {
        method,
        path,
        headers,
        body,
    }))
}

enum Framing {
    Length(usize),
    Chunked,
}

fn body_framing(headers: &[(String, String)]) -> Result<Framing, RequestError> {
    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    };

    match (header("transfer-encoding"), header("content-length")) {
        (Some(_), Some(_)) => Err(RequestError::Malformed(
            "both Transfer-Encoding and Content-Length present",
        )),
        (Some(coding), None) if coding.eq_ignore_ascii_case("chunked") => Ok(Framing::Chunked),
        (Some(coding), None) => Err(RequestError::UnsupportedEncoding(coding.to_string())),
        (None, Some(len)) => len
            .parse::<usize>()
            .map(Framing::Length)
            .map_err(|_| RequestError::Malformed("invalid Content-Length")),
        (None, None) => Ok(Framing::Length(0)),
    }
}

async fn read_sized<R>(
    reader: &mut R,
    mut body: Vec<u8>,
    content_length: usize,
    max_body: usize,
) -> Result<Vec<u8>, RequestError>
where
    R: AsyncRead + Unpin,
{
    if content_length > max_body {
        return Err(RequestError::BodyTooLarge(content_length));
    }

    body.truncate(content_length);
    while body.len() < content_length {
        fill(reader, &mut body).await?;
    }
    body.truncate(content_length);

    Ok(body)
}

/// Decode a chunked body; chunk extensions and trailers are read and discarded
async fn read_chunked<R>(
    reader: &mut R,
    mut pending: Vec<u8>,
    max_body: usize,
) -> Result<Vec<u8>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();

    loop {
        let line = take_line(reader, &mut pending).await?;
        let size_text = line.split(';').next().unwrap_or_default().trim();
        if size_text.is_empty() || !size_text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RequestError::Malformed("invalid chunk size"));
        }
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| RequestError::Malformed("invalid chunk size"))?;

        if size == 0 {
            while !take_line(reader, &mut pending).await?.is_empty() {}
            return Ok(body);
        }

        let total = body.len().saturating_add(size);
        if total > max_body {
            return Err(RequestError::BodyTooLarge(total));
        }

        while pending.len() < size + 2 {
            fill(reader, &mut pending).await?;
        }
        if &pending[size..size + 2] != b"\r\n" {
            return Err(RequestError::Malformed("chunk not terminated by CRLF"));
        }
        body.extend_from_slice(&pending[..size]);
        pending.drain(..size + 2);
    }
}

/// Pop one CRLF-terminated line off `pending`, reading more as needed
async fn take_line<R>(reader: &mut R, pending: &mut Vec<u8>) -> Result<String, RequestError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = pending.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = pending.drain(..pos + 2).take(pos).collect();
            return String::from_utf8(line)
                .map_err(|_| RequestError::Malformed("chunk line is not UTF-8"));
        }
        if pending.len() > MAX_CHUNK_LINE {
            return Err(RequestError::Malformed("chunk line too long"));
        }
        fill(reader, pending).await?;
    }
}

async fn fill<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<(), RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let n = reader.read(&mut chunk).await?;
    if n == 0 {
        return Err(RequestError::Truncated);
    }
    buf.extend_from_slice(&chunk[..n]);
    Ok(())
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

type Head = (String, String, Vec<(String, String)>);

/// Parse the request line and headers
pub fn parse_head(head: &str) -> Result<Head, RequestError> {
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(RequestError::Malformed("missing method"))?;
    let target = parts.next().ok_or(RequestError::Malformed("missing path"))?;
    let version = parts.next().ok_or(RequestError::Malformed("missing version"))?;

    if parts.next().is_some() || !version.starts_with("HTTP/1.") {
        return Err(RequestError::Malformed("bad request line"));
    }
    if !target.starts_with('/') {
        return Err(RequestError::Malformed("path must be absolute"));
    }

    let path = target.split(['?', '#']).next().unwrap_or(target);

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or(RequestError::Malformed("header without colon"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok((method.to_string(), path.to_string(), headers))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Sent as `Allow` on 405 responses
    pub allow: Option<&'static str>,
}

impl Response {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = match serde_json::to_string(value) {
            Ok(body) => body,
            Err(_) => return Self::internal_error(),
        };
        Self {
            status,
            content_type: "application/json",
            body,
            allow: None,
        }
    }

    pub fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            body,
            allow: None,
        }
    }

    pub fn with_allow(mut self, methods: &'static str) -> Self {
        self.allow = Some(methods);
        self
    }

    fn internal_error() -> Self {
        Self::text(
            500,
            "application/json",
            r#"{"error":{"code":"INTERNAL","message":"Internal server error"}}"#.to_string(),
        )
    }

    /// Serialize to wire format
    pub fn to_http(&self) -> String {
        let allow = match self.allow {
            Some(methods) => format!("Allow: {}\r\n", methods),
            None => String::new(),
        };

        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            allow,
            self.body
        )
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}
