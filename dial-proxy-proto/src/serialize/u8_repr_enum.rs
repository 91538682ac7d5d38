//! Provides the [`U8ReprEnum`] trait, which is made to be implemented by enums that can be
//! converted into or parsed from an [`u8`] value, for easy serialization and deserialization.

use std::{
    any::type_name,
    io::{self, Error, ErrorKind},
};

use tokio::io::AsyncRead;

use super::ByteRead;

/// Allows a type to be converted into or parsed from an [`u8`] representation.
pub trait U8ReprEnum: Sized + Copy {
    /// Parses an `u8` into the enum variant it represents. If the `u8` represents a variant in
    /// this enum, then `Some` is returned with said variant. Otherwise, `None` is returned.
    fn from_u8(value: u8) -> Option<Self>;

    /// Converts this enum into its `u8` representation.
    fn into_u8(self) -> u8;
}

/// Reads a single byte and parses it into a `T`, failing with [`ErrorKind::InvalidData`] if the
/// byte doesn't represent any of its variants.
pub async fn read_u8_repr<T: U8ReprEnum, R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<T> {
    let value = u8::read(reader).await?;
    T::from_u8(value).ok_or_else(|| {
        let message = format!("Invalid {} type byte, {value}", short_type_name::<T>());
        Error::new(ErrorKind::InvalidData, message)
    })
}

fn short_type_name<T>() -> &'static str {
    let name = type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
