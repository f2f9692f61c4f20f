//! Core Wi-Fi control logic

pub mod confirmation;
pub mod controller;
pub mod error;
pub mod event_bus;
pub mod listener;
pub mod service;
pub mod types;
