//! Error types for the HTTP reporter.

use core::fmt;

/// Reasons a report did not get an HTTP status back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    /// Wi-Fi link or IP configuration is down
    NotConnected,
    /// Endpoint is not a plain `http://` URL
    InvalidEndpoint,
    /// Host name did not resolve
    Dns,
    /// TCP connect failed or timed out
    Connect,
    /// Sending the request failed
    Write,
    /// Reading the response failed
    Read,
    /// Request does not fit the request buffer
    RequestTooLarge,
    /// Response has no parsable status line
    MalformedResponse,
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Error in WiFi connection"),
            Self::InvalidEndpoint => write!(f, "endpoint must be an http:// URL"),
            Self::Dns => write!(f, "host name lookup failed"),
            Self::Connect => write!(f, "TCP connect failed"),
            Self::Write => write!(f, "sending request failed"),
            Self::Read => write!(f, "reading response failed"),
            Self::RequestTooLarge => write!(f, "request exceeds buffer"),
            Self::MalformedResponse => write!(f, "response has no HTTP status line"),
        }
    }
}
