//! # courier-transport
//!
//! Network adapter boundary for the Courier router.
//!
//! The router needs three things from a peer network:
//!
//! - **broadcast** - send to every other peer, never looping back to self
//! - **send_to** - point-to-point send to one peer
//! - **events** - a stream of `(sender, bytes)` deliveries and peer departures
//!
//! [`Network`] and [`NetworkEvents`] capture that contract. The
//! [`memory::StarNetwork`] implementation wires peers together in-process
//! with a hub-and-spoke topology.
//!
//! ```rust
//! use courier_transport::memory::StarNetwork;
//!
//! let (net, _hub, _hub_events) = StarNetwork::new("hub");
//! let (_spoke, _spoke_events) = net.join("spoke-1").unwrap();
//! assert_eq!(net.peers().len(), 2);
//! ```

pub mod memory;
pub mod traits;

pub use memory::{MemoryPeer, StarNetwork};
pub use traits::{Network, NetworkEvent, NetworkEvents, PeerId, TransportError};
