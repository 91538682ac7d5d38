//! Defines the [`ByteRead`] and [`ByteWrite`] traits and implements them for the basic types the
//! dial protocol is built from.
//!
//! This includes [`u8`], [`u16`], [`u32`], [`str`] (write-only), [`String`],
//! [`Option<T>`] and tuples of up to 4 elements.
//!
//! # Serialization of [`Option<T>`]
//! [`Option<T>`] types have [`ByteRead`] and [`ByteWrite`] implemented for `T: ByteRead`
//! and/or `T: ByteWrite` respectively. Serializing this consists of a presence byte, 1 if Some and
//! 0 if None, and if 1 then this byte is followed by the serialization of `T`.
//!
//! # Serialization of strings
//! [`String`] and [`str`] are serialized as chunked strings, starting with an [`u16`] indicating
//! the length of the string in bytes, followed by said amount of bytes. Short identifiers, like
//! the network name of a [`NetAddr`](crate::shared::NetAddr), are serialized with [`u8`] length
//! instead through the [`SmallReadString`] and [`SmallWriteString`] types.
//!
//! # Serialization of byte buffers
//! Relayed payloads can be much larger than a string, so they are serialized with an [`u32`]
//! length through [`WriteBytes`] and [`ReadBytes`]. The reading side takes the maximum allowed
//! length as a const parameter and refuses anything longer before allocating.
//!
//! # Serialization of tuples
//! [`ByteWrite`] is also implemented for tuples of up to 4 elements, which allows turning
//! multiple writes into a single one:
//! ```ignore
//! (thing1, thing2, thing3).write(writer).await?;
//! ```

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub mod bytes;
pub mod enums;
pub mod primitives;
pub mod string;
pub mod tuples;
pub mod u8_repr_enum;

pub use bytes::*;
pub use string::*;
pub use u8_repr_enum::*;

/// Serializes a type into bytes, writing it to an [`AsyncWrite`] asynchronously.
#[allow(async_fn_in_trait)]
pub trait ByteWrite {
    /// Serializes this instance into bytes, writing those bytes into a writer.
    ///
    /// When an error occurs, there's no guarantee on how many bytes were written.
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()>;
}

/// Deserializes a type from raw bytes, reading it from an [`AsyncRead`] asynchronously.
#[allow(async_fn_in_trait)]
pub trait ByteRead: Sized {
    /// Deserializes bytes into an instance of this type by reading bytes from a reader.
    ///
    /// When an error occurs, there's no guarantee on how many bytes were read.
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self>;
}
