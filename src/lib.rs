//! Core library for the hp3478a_cal tool.
//!
//! Reads, writes and validates the calibration SRAM of an HP 3478A
//! multimeter through a USB-to-GPIB adapter with a `++` line protocol.
//! The [`adapter`] session drives the adapter, [`calibration`] decodes and
//! checks the memory image, and [`workflow`] sequences the two.

pub mod adapter;
pub mod calibration;
pub mod config;
pub mod error;
pub mod logging;
pub mod transport;
pub mod workflow;
