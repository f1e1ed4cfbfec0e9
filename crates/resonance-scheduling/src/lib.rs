//! Scheduling-provider integration.
//!
//! [`RestSchedulingClient`] is the typed REST client implementing
//! [`resonance_core::provider::SchedulingProvider`]; [`webhook`] holds the
//! wire-payload types of the provider's inbound webhook events.

pub mod client;
pub mod error;
pub mod webhook;

pub use client::RestSchedulingClient;
pub use error::{Error, Result};
