//! Command routing and subscription management module
//!
//! Incoming messages are dispatched to subscription callbacks by topic
//! pattern. Commands arriving on the device commands topic are executed by
//! the registered handlers and answered with exactly one response.

pub mod command_router;
/// Routing error types
pub mod error;
pub mod observers;
pub mod registry;
pub mod subscription_table;

pub use command_router::{CommandRouter, WeakCommandRouter};
pub use error::{HandlerError, RouterError};
pub use observers::ObserverList;
pub use registry::{CommandHandler, CommandRegistry, HandlerResult};
pub use subscription_table::{MessageCallback, SubscriptionTable};
