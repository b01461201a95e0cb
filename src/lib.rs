#![crate_name = "rust_ofp_core"]
#![crate_type = "lib"]

#[macro_use]
extern crate log;

extern crate failure;

#[macro_use]
extern crate failure_derive;

pub mod apps;

mod bits;

mod ofp_utils;

pub mod connection;
pub mod events;
pub mod flow;
pub mod interface;
pub mod keepalive;
pub mod message;
pub mod multipart;
pub mod negotiation;
pub mod ofp_controller;
pub mod ofp_device;
pub mod ofp_handler;
pub mod ofp_header;
pub mod ofp_message;
pub mod ofp_serialization;
pub mod openflow;
pub mod openflow0x01;
pub mod openflow0x04;
pub mod settings;
pub mod stats;
pub mod switch;
