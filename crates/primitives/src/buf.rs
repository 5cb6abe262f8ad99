//! Fixed-size byte buffers.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

macro_rules! impl_buf {
    ($name:ident, $len:expr) => {
        #[derive(
            Copy,
            Clone,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
            BorshSerialize,
            BorshDeserialize,
        )]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(data: [u8; $len]) -> Self {
                Self(data)
            }

            pub const fn zero() -> Self {
                Self([0; $len])
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            pub const fn into_inner(self) -> [u8; $len] {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zero()
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<[u8; $len]> for $name {
            fn as_ref(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = usize;

            /// Errors with the actual length if the slice is not exactly
            /// [`Self::LEN`] bytes.
            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; $len] = value.try_into().map_err(|_| value.len())?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                let mut arr = [0u8; $len];
                hex::decode_to_slice(&s, &mut arr).map_err(de::Error::custom)?;
                Ok(Self(arr))
            }
        }
    };
}

impl_buf!(Buf32, 32);
impl_buf!(Buf48, 48);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_default() {
        assert_eq!(Buf32::default(), Buf32::zero());
        assert!(Buf32::zero().is_zero());
        assert!(!Buf32::new([1; 32]).is_zero());
    }

    #[test]
    fn test_display_hex() {
        let buf = Buf32::new([0xab; 32]);
        assert_eq!(buf.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_try_from_slice() {
        let bytes = [7u8; 48];
        let buf = Buf48::try_from(&bytes[..]).unwrap();
        assert_eq!(buf.as_slice(), &bytes);

        let err = Buf48::try_from(&bytes[..20]).unwrap_err();
        assert_eq!(err, 20);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = Buf32::new([1; 32]);
        let mut raw = [1u8; 32];
        raw[31] = 2;
        let b = Buf32::new(raw);
        assert!(a < b);
    }
}
