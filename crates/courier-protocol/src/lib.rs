//! # courier-protocol
//!
//! Wire format for the Courier channel router.
//!
//! Routers exchange three kinds of envelopes:
//!
//! - `Notification` - one-way message broadcast on a channel
//! - `Request` - point-to-point call on a channel, correlated by ID
//! - `Response` - the single answer to a request
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::{codec, Envelope};
//!
//! let envelope = Envelope::request(1, "files:list", Vec::new());
//!
//! let encoded = codec::encode(&envelope).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(envelope, decoded);
//! ```

pub mod codec;
pub mod envelope;
pub mod version;

pub use codec::{decode, encode, ProtocolError};
pub use envelope::{Envelope, EnvelopeKind, RequestId};
pub use version::{Version, PROTOCOL_VERSION};
