//! Function composers.
//!
//! Each composer appends the records of one USB function to a [Context](crate::Context)
//! starting at a caller-supplied interface number and endpoint address, and returns the
//! [Allocation] it consumed. Composers never look at records they did not append, so
//! several functions compose by calling them in sequence with a running [Cursor].

use crate::consts::{Speed, SyncType, TransferType, UsageType};
use crate::context::{Context, DescId};
use crate::descriptor::{endpoint, interface, interface_association};
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod audio;
pub mod cdc;

/// Interface numbers and endpoint address pairs used by one function
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Allocation {
    pub interfaces: u8,
    pub endpoint_pairs: u8,
}

impl Allocation {
    pub const fn new(interfaces: u8, endpoint_pairs: u8) -> Self {
        Self {
            interfaces,
            endpoint_pairs,
        }
    }
}

/// Highest endpoint number
pub const MAX_ENDPOINT: u8 = 15;

/// Next free interface number and endpoint address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cursor {
    pub interface: u8,
    pub endpoint: u8,
}

impl Default for Cursor {
    fn default() -> Self {
        // endpoint 0 is the control pipe
        Self {
            interface: 0,
            endpoint: 1,
        }
    }
}

impl Cursor {
    pub fn new(interface: u8, endpoint: u8) -> Self {
        Self {
            interface,
            endpoint,
        }
    }

    /// Check that `used` fits before anything is appended
    ///
    /// The next free interface number must stay below 256 and the last endpoint
    /// number used must not pass [MAX_ENDPOINT].
    pub fn reserve(&self, used: Allocation) -> Result<()> {
        let interfaces = self.interface as u16 + used.interfaces as u16;
        if interfaces > u8::MAX as u16 {
            return Err(Error::UnsupportedConfiguration(format!(
                "{} interfaces from interface {}",
                used.interfaces, self.interface
            )));
        }
        let endpoints = self.endpoint as u16 + used.endpoint_pairs as u16;
        if (self.endpoint == 0 && used.endpoint_pairs > 0) || endpoints > MAX_ENDPOINT as u16 + 1 {
            return Err(Error::UnsupportedConfiguration(format!(
                "{} endpoint pairs from endpoint {}",
                used.endpoint_pairs, self.endpoint
            )));
        }
        Ok(())
    }

    pub fn advance(&mut self, used: Allocation) -> Result<()> {
        let overflow = || {
            Error::UnsupportedConfiguration(format!("cursor {self:?} cannot advance by {used:?}"))
        };
        let interface = self.interface.checked_add(used.interfaces).ok_or_else(overflow)?;
        let endpoint = self.endpoint.checked_add(used.endpoint_pairs).ok_or_else(overflow)?;
        self.interface = interface;
        self.endpoint = endpoint;
        Ok(())
    }
}

/// Default `(wMaxPacketSize, bInterval)` for an endpoint
///
/// Isochronous data endpoints report a packet size of 0; their size depends on the
/// stream format, see [iso_packet_size].
pub fn packet_policy(transfer: TransferType, speed: Speed, sync: SyncType) -> (u16, u8) {
    match (transfer, speed) {
        (TransferType::Control, _) => (64, 0),
        (TransferType::Bulk, Speed::High) => (512, 0),
        (TransferType::Bulk, Speed::Full) => (64, 0),
        // 16 bytes carries a whole ConnectionSpeedChange notification.
        // High speed: 2^(16-1) microframes, the longest period allowed.
        (TransferType::Interrupt, Speed::High) => (16, 16),
        (TransferType::Interrupt, Speed::Full) => (16, 255),
        (TransferType::Isochronous, speed) => {
            let interval = match speed {
                Speed::High => 4,
                Speed::Full => 1,
            };
            match (sync, speed) {
                // explicit feedback: 16.16 at high speed, 10.14 at full speed
                (SyncType::None, Speed::High) => (4, interval),
                (SyncType::None, Speed::Full) => (3, interval),
                _ => (0, interval),
            }
        }
    }
}

/// Isochronous packet size for one millisecond of 48 kHz audio
///
/// Asynchronous endpoints reserve one extra sample frame for rate adaptation.
pub fn iso_packet_size(channels: u8, sample_bytes: u8, sync: SyncType) -> u16 {
    let frame = channels as u16 * sample_bytes as u16;
    let mut size = frame * 48;
    if sync == SyncType::Async {
        size += frame;
    }
    size
}

/// Append an interface association spanning `count` interfaces from `first`
pub(crate) fn add_association(
    ctx: &mut Context,
    first: u8,
    count: u8,
    class: (u8, u8, u8),
    name: Option<&str>,
) -> Result<DescId> {
    let (class, subclass, protocol) = class;
    Ok(ctx
        .add_interface_association()?
        .set(&interface_association::FIRST_INTERFACE, first as u32)?
        .set(&interface_association::INTERFACE_COUNT, count as u32)?
        .set(&interface_association::FUNCTION_CLASS, class as u32)?
        .set(&interface_association::FUNCTION_SUBCLASS, subclass as u32)?
        .set(&interface_association::FUNCTION_PROTOCOL, protocol as u32)?
        .set_opt_string(&interface_association::FUNCTION, name)?
        .id())
}

/// Append an interface descriptor; `bNumEndpoints` is filled in on finalize
pub(crate) fn add_interface(
    ctx: &mut Context,
    number: u8,
    alternate: u8,
    class: (u8, u8, u8),
    name: Option<&str>,
) -> Result<DescId> {
    let (class, subclass, protocol) = class;
    Ok(ctx
        .add_interface()?
        .set(&interface::INTERFACE_NUMBER, number as u32)?
        .set(&interface::ALTERNATE_SETTING, alternate as u32)?
        .set(&interface::INTERFACE_CLASS, class as u32)?
        .set(&interface::INTERFACE_SUBCLASS, subclass as u32)?
        .set(&interface::INTERFACE_PROTOCOL, protocol as u32)?
        .set_opt_string(&interface::INTERFACE, name)?
        .id())
}

/// Endpoint attributes as seen by [add_endpoint]
#[derive(Clone, Copy, Debug)]
pub(crate) struct EndpointKind {
    pub transfer: TransferType,
    pub sync: SyncType,
    pub usage: UsageType,
}

impl EndpointKind {
    pub const BULK: Self = Self::plain(TransferType::Bulk);
    pub const INTERRUPT: Self = Self::plain(TransferType::Interrupt);

    const fn plain(transfer: TransferType) -> Self {
        Self {
            transfer,
            sync: SyncType::None,
            usage: UsageType::Data,
        }
    }

    pub const fn iso(sync: SyncType, usage: UsageType) -> Self {
        Self {
            transfer: TransferType::Isochronous,
            sync,
            usage,
        }
    }

    fn attributes(&self) -> u32 {
        self.transfer as u32 | self.sync as u32 | self.usage as u32
    }
}

/// Append an endpoint sized by [packet_policy]; `max_packet_size` overrides the policy size
pub(crate) fn add_endpoint(
    ctx: &mut Context,
    address: u8,
    kind: EndpointKind,
    speed: Speed,
    max_packet_size: Option<u16>,
) -> Result<DescId> {
    let (size, interval) = packet_policy(kind.transfer, speed, kind.sync);
    let size = max_packet_size.unwrap_or(size);
    Ok(ctx
        .add_endpoint()?
        .set(&endpoint::ENDPOINT_ADDRESS, address as u32)?
        .set(&endpoint::ATTRIBUTES, kind.attributes())?
        .set(&endpoint::MAX_PACKET_SIZE, size as u32)?
        .set(&endpoint::INTERVAL, interval as u32)?
        .id())
}
