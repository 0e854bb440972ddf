//! Protocol versioning for Courier.
//!
//! Every encoded envelope carries the sender's version in its header. Peers
//! accept frames whose major version matches their own.

/// Current protocol version.
pub const PROTOCOL_VERSION: Version = Version { major: 1, minor: 0 };

/// Protocol version information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major version - wire-incompatible changes increment this.
    pub major: u8,
    /// Minor version - additive changes increment this.
    pub minor: u8,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Header representation: `[major, minor]`.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.major, self.minor]
    }

    /// Parse the header representation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self::new(bytes[0], bytes[1])
    }

    /// Check if frames of `other` can be decoded by this version.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Default for Version {
    fn default() -> Self {
        PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_compatibility() {
        let v1_0 = Version::new(1, 0);
        let v1_3 = Version::new(1, 3);
        let v2_0 = Version::new(2, 0);

        assert!(v1_0.is_compatible_with(&v1_3));
        assert!(v1_3.is_compatible_with(&v1_0));
        assert!(!v1_0.is_compatible_with(&v2_0));
    }

    #[test]
    fn test_version_header_bytes() {
        let v = Version::new(1, 2);
        assert_eq!(v.to_bytes(), [1, 2]);
        assert_eq!(Version::from_bytes([1, 2]), v);
        assert_eq!(v.to_string(), "1.2");
    }
}
