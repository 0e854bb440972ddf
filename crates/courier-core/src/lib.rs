//! # courier-core
//!
//! Channel-multiplexed message routing over a peer network.
//!
//! Every participant in a session gets two primitives scoped to named
//! channels:
//!
//! - **Notifications** - fire-and-forget broadcast to every other peer
//! - **Requests** - point-to-point calls answered by exactly one response
//!
//! ## Architecture
//!
//! ```text
//!  outbound:  Router ──encode──▶ Network (broadcast / send_to)
//!
//!  inbound:   NetworkEvents ──▶ pump ──▶ queue ──▶ worker ──decode──┬──▶ SubscriptionRegistry
//!                                                                    │      ──▶ handler
//!                                                                    └──▶ RequestCorrelator
//!                                                                           ──▶ pending request
//! ```
//!
//! The worker awaits each handler to completion before taking the next
//! message, so one router's handlers run strictly in receipt order and never
//! overlap.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use courier_core::{HandlerResult, IncomingRequest, Router};
//! use courier_transport::StarNetwork;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (net, hub_net, hub_events) = StarNetwork::new("hub");
//! let (spoke_net, spoke_events) = net.join("spoke")?;
//!
//! let hub = Router::new(hub_net, hub_events);
//! let spoke = Router::new(spoke_net, spoke_events);
//!
//! hub.on_request("echo", |req: IncomingRequest| async move {
//!     req.respond(Some(req.request.clone())).await?;
//!     HandlerResult::Ok(())
//! })?;
//!
//! let reply = spoke
//!     .request(hub.local_id(), "echo", Some(Bytes::from_static(b"hi")))
//!     .await?;
//! assert_eq!(&reply[..], b"hi");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod correlator;
mod dispatch;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod responder;
pub mod router;

#[cfg(test)]
mod testing;

pub use channel::{validate_channel_name, ChannelId};
pub use correlator::{PendingResponse, RequestCorrelator};
pub use handler::{HandlerError, HandlerResult, NotificationHandler, RequestHandler};
pub use message::{IncomingRequest, Notification, RequestKey};
pub use registry::{RegistryStats, SubscriptionRegistry};
pub use responder::Responder;
pub use router::{Router, RouterConfig, RouterError, RouterStats};
