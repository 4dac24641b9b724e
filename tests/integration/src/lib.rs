//! Multi-node integration tests
//!
//! Every scenario wires two or three complete nodes (router, health
//! monitor, gateway, bus) over one in-memory loopback hub and drives them
//! by ticking their loops by hand:
//! - Offline delivery through the connectivity cache
//! - Health check round trips and link statistics
//! - Encrypted text and CoT delivery, key-share exchange

pub mod test_utils;

#[cfg(test)]
mod offline_delivery_tests;

#[cfg(test)]
mod health_exchange_tests;

#[cfg(test)]
mod secure_messaging_tests;
