//! Minimal HTTP/1.1 client framing for the report POST

use core::fmt::Write;

use heapless::String;

use crate::error::ReportError;

pub const DEFAULT_PORT: u16 = 80;
pub const MAX_REQUEST_LEN: usize = 512;

/// Parsed `http://host[:port][/path][?query]` URL
///
/// `path` keeps the query; it starts with `?` when the URL has no path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl<'a> Endpoint<'a> {
    /// Only plain HTTP is supported
    pub fn parse(url: &'a str) -> Result<Self, ReportError> {
        let rest = url
            .strip_prefix("http://")
            .ok_or(ReportError::InvalidEndpoint)?;

        let (authority, path) = match rest.find(['/', '?']) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| ReportError::InvalidEndpoint)?,
            ),
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ReportError::InvalidEndpoint);
        }

        Ok(Self { host, port, path })
    }
}

/// Frame a JSON POST to `endpoint`
pub fn build_post(
    endpoint: &Endpoint<'_>,
    body: &str,
) -> Result<String<MAX_REQUEST_LEN>, ReportError> {
    let mut request = String::new();
    write!(
        request,
        "POST {}{} HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        if endpoint.path.starts_with('/') { "" } else { "/" },
        endpoint.path,
        endpoint.host,
        body.len(),
        body
    )
    .map_err(|_| ReportError::RequestTooLarge)?;
    Ok(request)
}

/// Status code from an `HTTP/1.x NNN ...` status line
pub fn parse_status(response: &[u8]) -> Option<u16> {
    let line_end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(response.len());
    let line = core::str::from_utf8(&response[..line_end]).ok()?;

    let mut parts = line.split(' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse::<u16>().ok()
}

/// Bytes after the header block, empty if the headers never ended
pub fn response_body(response: &[u8]) -> &[u8] {
    match response.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(idx) => &response[idx + 4..],
        None => &[],
    }
}
