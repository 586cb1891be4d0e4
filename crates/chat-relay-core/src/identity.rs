//! Client identities and conversation pair keys.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Integer handle assigned to a connection when it is accepted.
///
/// Identities are positive, handed out in increasing order and never reused
/// within one process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Wrap a raw identity value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identity value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for ClientId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A target identity as written in a `Forward` or `history` command.
///
/// Any optionally signed run of ASCII digits is well formed. Only positive
/// values that fit a [`ClientId`] can name a client; the rest are still
/// integers and are echoed back in not-found replies. The text is kept in
/// canonical decimal form (no `+`, no leading zeros, no `-0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    text: String,
    client: Option<ClientId>,
}

impl TargetId {
    /// The client this target can refer to, if any.
    pub fn client(&self) -> Option<ClientId> {
        self.client
    }
}

/// The target token is not an integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an integer: {0:?}")]
pub struct InvalidTargetId(pub String);

impl FromStr for TargetId {
    type Err = InvalidTargetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTargetId(s.to_string()));
        }

        let magnitude = digits.trim_start_matches('0');
        let text = match (negative, magnitude) {
            (_, "") => "0".to_string(),
            (true, m) => format!("-{m}"),
            (false, m) => m.to_string(),
        };
        let client = if negative {
            None
        } else {
            magnitude.parse::<u64>().ok().map(ClientId::new)
        };

        Ok(Self { text, client })
    }
}

impl From<ClientId> for TargetId {
    fn from(id: ClientId) -> Self {
        Self {
            text: id.to_string(),
            client: (id.get() > 0).then_some(id),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Unordered pair of identities used to index shared conversation history.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)` for all `a`, `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: ClientId,
    high: ClientId,
}

impl PairKey {
    pub fn new(a: ClientId, b: ClientId) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// `true` when both sides of the pair are the same client.
    pub fn is_self_pair(&self) -> bool {
        self.low == self.high
    }
}
