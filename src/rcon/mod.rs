mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod packet;

pub use client::{RconClient, RconSession, DEFAULT_TIMEOUT};
pub use error::RconError;
