//! Header map and protocol versions
//!
//! Header names compare case-insensitively but keep the spelling they were
//! set with, and iteration follows insertion order so serialization is
//! stable.

use std::fmt;

/// Connection directive header
pub const CONNECTION: &str = "Connection";

/// Body length header
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Body type header
pub const CONTENT_TYPE: &str = "Content-Type";

/// Sender's logical time as a decimal integer
pub const LAMPORT_CLOCK: &str = "Lamport-Clock";

/// Server identification header
pub const SERVER: &str = "Server";

/// Client identification header
pub const USER_AGENT: &str = "User-Agent";

/// Media type for observation payloads
pub const APPLICATION_JSON: &str = "application/json";

/// Media type for plain messages
pub const TEXT_PLAIN: &str = "text/plain";

/// Supported protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// Closes after each exchange unless asked to keep alive
    Http10,

    /// Persistent unless asked to close
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    /// Keep-alive behaviour when no `Connection` header is present
    pub fn default_keep_alive(&self) -> bool {
        matches!(self, Version::Http11)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value domain of the `Connection` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    KeepAlive,
    Close,
}

impl ConnectionDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionDirective::KeepAlive => "keep-alive",
            ConnectionDirective::Close => "close",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("keep-alive") {
            Some(ConnectionDirective::KeepAlive)
        } else if value.eq_ignore_ascii_case("close") {
            Some(ConnectionDirective::Close)
        } else {
            None
        }
    }

    pub fn from_keep_alive(keep_alive: bool) -> Self {
        if keep_alive {
            ConnectionDirective::KeepAlive
        } else {
            ConnectionDirective::Close
        }
    }
}

/// Ordered, case-insensitive header map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a header, replacing an existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // =========================================================================
    // Typed accessors (values were validated when parsed)
    // =========================================================================

    pub fn content_length(&self) -> Option<usize> {
        self.get(CONTENT_LENGTH)?.trim().parse().ok()
    }

    pub fn connection(&self) -> Option<ConnectionDirective> {
        ConnectionDirective::parse(self.get(CONNECTION)?.trim())
    }

    pub fn clock(&self) -> Option<u64> {
        self.get(LAMPORT_CLOCK)?.trim().parse().ok()
    }

    /// Whether a message with these headers keeps the connection open
    pub fn keep_alive(&self, version: Version) -> bool {
        match self.connection() {
            Some(directive) => directive == ConnectionDirective::KeepAlive,
            None => version.default_keep_alive(),
        }
    }
}
