//! Firmware ABI model for Intel Skylake-family audio DSPs.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a pure
//! model of what the host and the DSP firmware agree on: PCI identifiers of
//! the supported controllers, IPC header bit layout and message numbers,
//! gateway node-id encoding, topology enumerations and the sizes of the
//! configuration records sent with module messages.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor/device IDs, DSP variant table (family, cores, firmware) |
//! | [`ipc`] | IPC header fields, message types, large-config param ids, status codes |
//! | [`node`] | Gateway DMA classes and connector node-id encode/decode |
//! | [`topology`] | Module type, device type, connection type, stream direction |
//! | [`abi`] | Configuration record sizes and fixed wire values |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod abi;
pub mod ipc;
pub mod node;
pub mod pcie;
pub mod topology;
