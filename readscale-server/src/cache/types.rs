use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;
use thiserror::Error;

/// Time-to-live for a cache entry, in whole seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Ttl(NonZeroU64);

impl Ttl {
    /// 60 seconds
    pub const DEFAULT: Ttl = Ttl(NonZeroU64::new(60).unwrap());

    /// Create a TTL from seconds, rejecting zero
    pub fn from_secs(secs: u64) -> Result<Self, InvalidTtl> {
        NonZeroU64::new(secs).map(Ttl).ok_or(InvalidTtl(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u64> for Ttl {
    type Error = InvalidTtl;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Ttl::from_secs(secs)
    }
}

impl From<Ttl> for u64 {
    fn from(ttl: Ttl) -> Self {
        ttl.as_secs()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("TTL must be a positive number of seconds, got {0}")]
pub struct InvalidTtl(pub u64);

/// Errors raised by a cache store client. The cache-aside layer never
/// surfaces these to callers.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rejects_zero() {
        assert_eq!(Ttl::from_secs(0), Err(InvalidTtl(0)));
        assert_eq!(Ttl::from_secs(120).unwrap().as_secs(), 120);
    }

    #[test]
    fn test_ttl_default() {
        assert_eq!(Ttl::default().as_secs(), 60);
        assert_eq!(Ttl::DEFAULT.as_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_ttl_serde() {
        let ttl: Ttl = serde_json::from_str("30").unwrap();
        assert_eq!(ttl.as_secs(), 30);
        assert!(serde_json::from_str::<Ttl>("0").is_err());
        assert_eq!(serde_json::to_string(&ttl).unwrap(), "30");
    }
}
