//! The framed protocol spoken over a single bidirectional stream between a dial-proxy client and
//! the proxy.
//!
//! Every message on the stream is a [`Frame`](shared::Frame). The client opens the stream and
//! must send a [`DialRequest`](shared::DialRequest) frame first, indicating which node it wants
//! to reach. After the proxy dialed the node, both sides exchange [`Data`](shared::Data) frames
//! until either side finishes its sending half. When the proxy gives up on a session because of
//! an error, it resets the stream with a [`StatusCode`](shared::StatusCode) as the application
//! error code, so the client can tell why.
//!
//! The [`serialize`] module provides the [`ByteRead`](serialize::ByteRead) and
//! [`ByteWrite`](serialize::ByteWrite) traits every message implements.

pub mod serialize;
pub mod shared;
