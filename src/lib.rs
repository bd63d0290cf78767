//! A library for building USB2 descriptor tables and CDC-NCM transfer blocks
//!
//! Descriptors are appended to a [Context], either directly or through the function
//! composers in [functions::cdc] and [functions::audio]. [Context::finalize] then
//! fills in every field that depends on the whole table (lengths, counts, configuration
//! values), appends the string descriptors and locks the table for serialization.
//!
//! [Ntb] builds NCM transfer blocks the same way: tables and datagrams first, then
//! [Ntb::wrap] resolves offsets and links.

mod config;
mod consts;
mod context;
mod descriptor;
mod error;
pub mod functions;
pub mod ntb;
mod record;
mod strings;
mod table;
mod util;
mod wrapup;
pub use config::*;
pub use consts::*;
pub use context::*;
pub use descriptor::*;
pub use error::*;
pub use functions::{Allocation, Cursor, iso_packet_size, packet_policy};
pub use ntb::{BlockLength, CrcTrailer, DatagramId, NdpId, Ntb, NtbSession};
pub use record::*;
pub use strings::*;
pub use table::*;
pub use util::*;
