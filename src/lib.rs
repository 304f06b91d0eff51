//! Library for talking to the ESP8266 ROM bootloader over serial
//!
//! Provides the DTR/RTS reset sequencing, SLIP framing, command
//! protocol and sync handshake needed to establish a session with the
//! ROM and operate on it.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod interface;
pub mod slip;

pub use crate::{
    config::Config,
    connection::Connection,
    error::Error,
    interface::{SerialInterface, Transport},
};
