use thiserror::Error;

/// `BitTorrent` Info Hash v1: the 20-byte SHA-1 of the torrent's info
/// dictionary. It is the torrent's identifier on the wire.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; 20]);

pub const INFO_HASH_BYTES_LEN: usize = 20;

impl InfoHash {
    /// Create a new `InfoHash` from a byte slice.
    ///
    /// # Panics
    ///
    /// Will panic if the byte slice does not contain the exact amount of
    /// bytes needed for the `InfoHash`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), INFO_HASH_BYTES_LEN);
        let mut data = [0u8; INFO_HASH_BYTES_LEN];
        data.copy_from_slice(bytes);
        Self(data)
    }

    /// Returns the `InfoHash` internal byte array.
    #[must_use]
    pub fn bytes(&self) -> [u8; 20] {
        self.0
    }

    /// Returns the `InfoHash` as a hex string.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chars = [0u8; 40];
        binascii::bin2hex(&self.0, &mut chars).expect("failed to hexlify");
        write!(f, "{}", std::str::from_utf8(&chars).unwrap())
    }
}

/// Errors that can occur when converting from a hex string to an `InfoHash`.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The string must be 40 hex characters long.
    #[error("invalid info hash length, got: {0}")]
    InvalidLength(usize),
    /// The string must contain only hex characters.
    #[error("invalid hex characters in info hash")]
    InvalidChars,
}

impl std::str::FromStr for InfoHash {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ConversionError::InvalidLength(s.len()));
        }
        let mut i = Self::default();
        binascii::hex2bin(s.as_bytes(), &mut i.0).map_err(|_| ConversionError::InvalidChars)?;
        Ok(i)
    }
}

impl serde::Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
