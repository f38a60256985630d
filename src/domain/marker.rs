//! Placeholder markers embedded in a request buffer in place of deferred content.
//!
//! A marker has to be distinct from anything ordinary rendering can produce,
//! otherwise substitution at flush time would rewrite user content. The
//! default [`DistinctStrings`] source wraps a per-request random nonce and a
//! sequence number in Unicode private-use code points, which never occur in
//! templated text.

use std::fmt;

use uuid::Uuid;

const MARKER_OPEN: char = '\u{E000}';
const MARKER_CLOSE: char = '\u{E001}';

/// Opaque placeholder string handed out by [`MarkerSource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker(String);

impl Marker {
    /// Wrap an already-distinct string. Callers are responsible for its uniqueness.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Marker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Marker> for String {
    fn from(marker: Marker) -> Self {
        marker.0
    }
}

/// Supplies markers that never collide with each other or with rendered text.
pub trait MarkerSource {
    fn next_distinct_string(&mut self) -> Marker;
}

/// Default marker source: one instance per request.
#[derive(Debug, Clone)]
pub struct DistinctStrings {
    nonce: String,
    issued: u64,
}

impl DistinctStrings {
    pub fn new() -> Self {
        Self::with_nonce(Uuid::new_v4().simple().to_string())
    }

    /// Build a source with a fixed nonce, for reproducible output.
    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            issued: 0,
        }
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}

impl Default for DistinctStrings {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerSource for DistinctStrings {
    fn next_distinct_string(&mut self) -> Marker {
        self.issued = self.issued.saturating_add(1);
        Marker(format!(
            "{MARKER_OPEN}__MASON_DEFER_{}_{}__{MARKER_CLOSE}",
            self.nonce, self.issued
        ))
    }
}
