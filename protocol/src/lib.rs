//! Client side of the TP-Link Kasa smart plug protocol: JSON commands,
//! XOR autokey encrypted, length-prefixed over TCP.

pub mod kasa;
pub mod relay;
