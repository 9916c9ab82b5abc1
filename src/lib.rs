//! zap-relay — webhook relay between a WhatsApp gateway and a completion backend.

pub mod completion;
pub mod config;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod routing;
pub mod webhook;
