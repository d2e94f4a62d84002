//! Channel identity.
//!
//! A channel names an independent timeline. Two operations on different
//! channels never conflict; two operations on the same channel must occupy
//! disjoint intervals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Family a channel belongs to. Only used for naming and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelKind {
    Drive,
    Control,
    Measure,
    Acquire,
    Memory,
}

impl ChannelKind {
    /// Short prefix used in channel names (`d0`, `u3`, ...).
    pub fn prefix(&self) -> &'static str {
        match self {
            ChannelKind::Drive => "d",
            ChannelKind::Control => "u",
            ChannelKind::Measure => "m",
            ChannelKind::Acquire => "a",
            ChannelKind::Memory => "mem",
        }
    }

    // Longest prefix first so that "mem3" is not read as "m" + "em3".
    const PARSE_ORDER: [ChannelKind; 5] = [
        ChannelKind::Memory,
        ChannelKind::Drive,
        ChannelKind::Control,
        ChannelKind::Measure,
        ChannelKind::Acquire,
    ];
}

/// A typed channel index, e.g. `Channel::drive(0)` named `d0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Channel {
    kind: ChannelKind,
    index: u32,
}

impl Channel {
    pub const fn new(kind: ChannelKind, index: u32) -> Self {
        Self { kind, index }
    }

    pub const fn drive(index: u32) -> Self {
        Self::new(ChannelKind::Drive, index)
    }

    pub const fn control(index: u32) -> Self {
        Self::new(ChannelKind::Control, index)
    }

    pub const fn measure(index: u32) -> Self {
        Self::new(ChannelKind::Measure, index)
    }

    pub const fn acquire(index: u32) -> Self {
        Self::new(ChannelKind::Acquire, index)
    }

    pub const fn memory(index: u32) -> Self {
        Self::new(ChannelKind::Memory, index)
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Display name used for deterministic tie-breaking in flattened output.
    pub fn name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.index)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

/// Digits only, without a sign or a leading zero, so names survive a round trip.
fn is_canonical_index(digits: &str) -> bool {
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        for kind in ChannelKind::PARSE_ORDER {
            if let Some(rest) = trimmed.strip_prefix(kind.prefix()) {
                if !is_canonical_index(rest) {
                    continue;
                }
                if let Ok(index) = rest.parse::<u32>() {
                    return Ok(Channel::new(kind, index));
                }
            }
        }
        Err(format!("Invalid channel name: '{}'", s))
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.name()
    }
}

impl TryFrom<String> for Channel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Sorted channel names, the last component of the flatten ordering key.
pub fn sorted_channel_names(channels: &[Channel]) -> Vec<String> {
    let mut names: Vec<String> = channels.iter().map(Channel::name).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::drive(0).name(), "d0");
        assert_eq!(Channel::control(12).name(), "u12");
        assert_eq!(Channel::memory(3).to_string(), "mem3");
    }

    #[test]
    fn test_channel_parse_roundtrip() {
        for channel in [
            Channel::drive(4),
            Channel::measure(1),
            Channel::acquire(0),
            Channel::memory(7),
            Channel::control(10),
        ] {
            let parsed: Channel = channel.name().parse().unwrap();
            assert_eq!(parsed, channel);
        }
    }

    #[test]
    fn test_channel_parse_rejects_garbage() {
        assert!("x1".parse::<Channel>().is_err());
        assert!("d".parse::<Channel>().is_err());
        assert!("d-1".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_parse_rejects_non_canonical_index() {
        assert!("d+1".parse::<Channel>().is_err());
        assert!("d01".parse::<Channel>().is_err());
        assert!("mem00".parse::<Channel>().is_err());
        assert!("d 1".parse::<Channel>().is_err());
        assert_eq!("d0".parse::<Channel>().unwrap(), Channel::drive(0));
        assert_eq!("u10".parse::<Channel>().unwrap(), Channel::control(10));
    }

    #[test]
    fn test_sorted_names_are_lexicographic() {
        let names = sorted_channel_names(&[Channel::drive(2), Channel::drive(10), Channel::acquire(0)]);
        assert_eq!(names, vec!["a0", "d10", "d2"]);
    }

    #[test]
    fn test_channel_serializes_as_name() {
        let json = serde_json::to_string(&Channel::measure(2)).unwrap();
        assert_eq!(json, "\"m2\"");
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Channel::measure(2));
    }
}
