//! Core SMTP types.

mod address;
mod capabilities;
mod reply;

pub use address::Address;
pub use capabilities::{AuthMechanism, Capabilities};
pub use reply::{Reply, ReplyCode};
