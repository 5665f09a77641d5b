//! # Row Management
//!
//! The table schema is fixed: `id` (u32 primary key), `username`
//! (32 bytes), `email` (255 bytes). A row is stored as a 291-byte
//! fixed-width record: the id as a little-endian u32 followed by both
//! strings NUL-padded to their column width.

use crate::errors::Error;
use bincode::{config, Decode, Encode};
use std::fmt;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

/// Serialized size of a row.
pub const ROW_SIZE: usize = 4 + COLUMN_USERNAME_SIZE + COLUMN_EMAIL_SIZE;

/// A single table row with fixed-width columns.
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; COLUMN_USERNAME_SIZE],
    pub email: [u8; COLUMN_EMAIL_SIZE],
}

/// Fixed-int little-endian settings so the derive output matches the
/// on-disk record layout byte for byte.
fn codec_config() -> impl config::Config {
    config::standard().with_fixed_int_encoding()
}

impl Row {
    /// Builds a row from string columns, NUL-padding each to its column
    /// width. Oversized input is truncated; length limits are enforced by
    /// the statement parser before a `Row` is built.
    pub fn new(id: u32, username: &str, email: &str) -> Row {
        let mut row = Row {
            id,
            username: [0; COLUMN_USERNAME_SIZE],
            email: [0; COLUMN_EMAIL_SIZE],
        };
        let bytes = username.as_bytes();
        let len = bytes.len().min(COLUMN_USERNAME_SIZE);
        row.username[..len].copy_from_slice(&bytes[..len]);

        let bytes = email.as_bytes();
        let len = bytes.len().min(COLUMN_EMAIL_SIZE);
        row.email[..len].copy_from_slice(&bytes[..len]);
        row
    }

    /// Packs the row into its 291-byte on-disk form.
    ///
    /// # Errors
    /// Returns an `Error::Encoding` if `buf` is shorter than [`ROW_SIZE`]
    /// or the encoder produces an unexpected length.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), Error> {
        let written = bincode::encode_into_slice(self, buf, codec_config())
            .map_err(|e| err!(Encoding, "Failed to encode row. {}", e))?;
        if written != ROW_SIZE {
            return Err(err!(Encoding, "Unexpected encoded row size {}.", written));
        }
        Ok(())
    }

    /// Unpacks a row from its on-disk form.
    pub fn deserialize(buf: &[u8]) -> Result<Row, Error> {
        let (row, _) = bincode::decode_from_slice(buf, codec_config())
            .map_err(|e| err!(Encoding, "Failed to decode row. {}", e))?;
        Ok(row)
    }

    pub fn username(&self) -> String {
        String::from_utf8_lossy(&self.username)
            .trim_end_matches('\0')
            .to_string()
    }

    pub fn email(&self) -> String {
        String::from_utf8_lossy(&self.email)
            .trim_end_matches('\0')
            .to_string()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}
