use std::fmt;

use strum::{EnumIter, IntoEnumIterator};

/// Protocol versions known to the proxy, ordered by their wire number.
///
/// `Legacy` and `Unknown` are sentinels: they never appear in a packet
/// registry and `is_supported` is false for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[repr(i32)]
pub enum ProtocolVersion {
    Legacy = -2,
    Unknown = -1,
    V1_7_2 = 4,
    V1_7_6 = 5,
    V1_8 = 47,
    V1_9 = 107,
    V1_9_1 = 108,
    V1_9_2 = 109,
    V1_9_4 = 110,
    V1_10 = 210,
    V1_11 = 315,
    V1_11_1 = 316,
    V1_12 = 335,
    V1_12_1 = 338,
    V1_12_2 = 340,
    V1_13 = 393,
    V1_13_1 = 401,
    V1_13_2 = 404,
    V1_14 = 477,
    V1_14_1 = 480,
    V1_14_2 = 485,
    V1_14_3 = 490,
    V1_14_4 = 498,
    V1_15 = 573,
    V1_15_1 = 575,
    V1_15_2 = 578,
    V1_16 = 735,
    V1_16_1 = 736,
    V1_16_2 = 751,
    V1_16_3 = 753,
    V1_16_4 = 754,
    V1_17 = 755,
    V1_17_1 = 756,
}

const SENTINELS: usize = 2;

impl ProtocolVersion {
    pub const MINIMUM: ProtocolVersion = ProtocolVersion::V1_7_2;
    pub const MAXIMUM: ProtocolVersion = ProtocolVersion::V1_17_1;

    pub const fn protocol(self) -> i32 {
        self as i32
    }

    pub const fn names(self) -> &'static [&'static str] {
        use ProtocolVersion::*;
        match self {
            Legacy => &["legacy"],
            Unknown => &["unknown"],
            V1_7_2 => &["1.7.2", "1.7.3", "1.7.4", "1.7.5"],
            V1_7_6 => &["1.7.6", "1.7.7", "1.7.8", "1.7.9", "1.7.10"],
            V1_8 => &["1.8", "1.8.1", "1.8.2", "1.8.3", "1.8.4", "1.8.5", "1.8.6", "1.8.7", "1.8.8", "1.8.9"],
            V1_9 => &["1.9"],
            V1_9_1 => &["1.9.1"],
            V1_9_2 => &["1.9.2"],
            V1_9_4 => &["1.9.3", "1.9.4"],
            V1_10 => &["1.10", "1.10.1", "1.10.2"],
            V1_11 => &["1.11"],
            V1_11_1 => &["1.11.1", "1.11.2"],
            V1_12 => &["1.12"],
            V1_12_1 => &["1.12.1"],
            V1_12_2 => &["1.12.2"],
            V1_13 => &["1.13"],
            V1_13_1 => &["1.13.1"],
            V1_13_2 => &["1.13.2"],
            V1_14 => &["1.14"],
            V1_14_1 => &["1.14.1"],
            V1_14_2 => &["1.14.2"],
            V1_14_3 => &["1.14.3"],
            V1_14_4 => &["1.14.4"],
            V1_15 => &["1.15"],
            V1_15_1 => &["1.15.1"],
            V1_15_2 => &["1.15.2"],
            V1_16 => &["1.16"],
            V1_16_1 => &["1.16.1"],
            V1_16_2 => &["1.16.2"],
            V1_16_3 => &["1.16.3"],
            V1_16_4 => &["1.16.4", "1.16.5"],
            V1_17 => &["1.17"],
            V1_17_1 => &["1.17.1"],
        }
    }

    pub const fn name(self) -> &'static str {
        self.names()[0]
    }

    pub fn most_recent_name(self) -> &'static str {
        let names = self.names();
        names[names.len() - 1]
    }

    pub const fn is_legacy(self) -> bool {
        matches!(self, ProtocolVersion::Legacy)
    }

    pub const fn is_unknown(self) -> bool {
        matches!(self, ProtocolVersion::Unknown)
    }

    pub const fn is_valid(self) -> bool {
        !self.is_legacy() && !self.is_unknown()
    }

    /// Returns the matching version, or `Unknown` for numbers outside the catalog.
    pub fn from_protocol(protocol: i32) -> ProtocolVersion {
        ProtocolVersion::iter()
            .find(|version| version.protocol() == protocol)
            .unwrap_or(ProtocolVersion::Unknown)
    }

    pub fn is_supported(protocol: i32) -> bool {
        ProtocolVersion::from_protocol(protocol).is_valid()
    }

    /// The version to speak with a peer announcing `protocol`: the exact match
    /// when supported, otherwise the minimum version.
    pub fn closest_supported(protocol: i32) -> ProtocolVersion {
        match ProtocolVersion::from_protocol(protocol) {
            version if version.is_valid() => version,
            _ => ProtocolVersion::MINIMUM,
        }
    }

    pub fn supported() -> impl DoubleEndedIterator<Item = ProtocolVersion> {
        ProtocolVersion::iter().skip(SENTINELS)
    }

    pub fn supported_count() -> usize {
        ProtocolVersion::iter().count() - SENTINELS
    }

    /// Dense position among supported versions, `None` for sentinels.
    pub fn index(self) -> Option<usize> {
        ProtocolVersion::supported().position(|version| version == self)
    }

    pub fn version_range_string() -> String {
        format!("{}-{}", ProtocolVersion::MINIMUM.name(), ProtocolVersion::MAXIMUM.most_recent_name())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
