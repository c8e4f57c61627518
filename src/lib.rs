//! Water level monitor firmware library
//!
//! Hardware-independent cycle logic lives in [`logic`], [`payload`] and [`http`];
//! the ESP32-S3 drivers live in [`hardware`] and [`network`].

#![no_std]

pub mod config;
pub mod error;
pub mod hardware;
pub mod http;
pub mod logic;
pub mod model;
pub mod network;
pub mod payload;
pub mod traits;
