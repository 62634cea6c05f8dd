//! Shared utilities for xds-server.

use tonic::metadata::MetadataMap;

/// Metadata key carrying the session token.
pub const TOKEN_METADATA_KEY: &str = "x-xds-token";

/// Nonces for one session's responses.
///
/// Nonces only have to be unique within a stream, so a plain counter is
/// enough. The format is eight zero-padded lowercase hex digits, starting
/// at `00000001`.
///
/// # Example
///
/// ```ignore
/// let mut nonces = NonceGenerator::new();
/// assert_eq!(nonces.next_nonce(), "00000001");
/// assert_eq!(nonces.next_nonce(), "00000002");
/// ```
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: u64,
}

impl NonceGenerator {
    /// Create a generator for a new session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next nonce of this session.
    pub fn next_nonce(&mut self) -> String {
        self.last += 1;
        format!("{:08x}", self.last)
    }
}

/// Read the session token from request metadata, if present and printable.
pub fn token_from_metadata(metadata: &MetadataMap) -> Option<String> {
    metadata
        .get(TOKEN_METADATA_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
