use bitflags::bitflags;
use num_derive::FromPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptor type codes, as found at offset 1 of every descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Device = 0x01,
    Configuration = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
    DeviceQualifier = 0x06,
    OtherSpeedConfiguration = 0x07,
    InterfacePower = 0x08,
    InterfaceAssociation = 0x0B,
    CsInterface = 0x24,
    CsEndpoint = 0x25,
    /// Table terminator; never sent to a host
    Sentinel = 0xFF,
}

/// Class codes used by the supported functions
///
/// https://www.usb.org/defined-class-codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ClassCode {
    SeeInterface = 0x00,
    Audio = 0x01,
    CDC = 0x02,
    CDCData = 0x0A,
    Misc = 0xEF,
}

/// Operating speed a set of descriptors is built for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Speed {
    Full,
    #[default]
    High,
}

pub const ENDPOINT_IN: u8 = 0x80;
pub const ENDPOINT_OUT: u8 = 0x00;

/// Endpoint transfer type, bits 1..0 of `bmAttributes`
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum TransferType {
    Control = 0x00,
    Isochronous = 0x01,
    Bulk = 0x02,
    Interrupt = 0x03,
}

/// Isochronous synchronization type, bits 3..2 of `bmAttributes`
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SyncType {
    None = 0x00,
    Async = 0x04,
    Adaptive = 0x08,
    Synchronous = 0x0C,
}

/// Isochronous usage type, bits 5..4 of `bmAttributes`
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum UsageType {
    Data = 0x00,
    Feedback = 0x10,
    Implicit = 0x20,
}

/// US English, the only language we emit
pub const LANGID_EN_US: u16 = 0x0409;

pub const BCD_USB_2_0: u16 = 0x0200;

bitflags! {
    /// Configuration `bmAttributes`; bit 7 is always set on write
    pub struct ConfigAttributes: u8 {
        const SELF_POWERED = 0x40;
        const REMOTE_WAKEUP = 0x20;
    }
}

pub mod cdc {
    pub const SUBCLASS_ACM: u8 = 0x02;
    pub const SUBCLASS_ECM: u8 = 0x06;
    pub const SUBCLASS_NCM: u8 = 0x0D;
    pub const PROTOCOL_NONE: u8 = 0x00;

    pub const DATA_SUBCLASS_NONE: u8 = 0x00;
    pub const DATA_PROTOCOL_NONE: u8 = 0x00;
    pub const DATA_PROTOCOL_NTB: u8 = 0x01;

    pub const SUBTYPE_HEADER: u8 = 0x00;
    pub const SUBTYPE_CALL_MANAGEMENT: u8 = 0x01;
    pub const SUBTYPE_ACM: u8 = 0x02;
    pub const SUBTYPE_UNION: u8 = 0x06;
    pub const SUBTYPE_ETHERNET: u8 = 0x0F;
    pub const SUBTYPE_NCM: u8 = 0x1A;

    pub const BCD_CDC: u16 = 0x0120;
    pub const BCD_NCM: u16 = 0x0100;

    /// wNumberMCFilters flag: perfect multicast filtering
    pub const ETH_MC_PERFECT: u16 = 0x8000;
    pub const ETH_MAX_SEGMENT_SIZE: u16 = 1514;
}

bitflags! {
    /// Abstract control management `bmCapabilities`
    pub struct AcmCapabilities: u8 {
        const COMM_FEATURE = 0x01;
        const LINE_CODING = 0x02;
        const SEND_BREAK = 0x04;
        const NETWORK_CONNECTION = 0x08;
    }
}

bitflags! {
    /// NCM functional descriptor `bmNetworkCapabilities`
    pub struct NcmCapabilities: u8 {
        const PACKET_FILTER = 0x01;
        const NET_ADDRESS = 0x02;
        const ENCAPSULATED_COMMAND = 0x04;
        const MAX_DATAGRAM_SIZE = 0x08;
        const CRC_MODE = 0x10;
        const NTB_INPUT_SIZE_8 = 0x20;
    }
}

pub mod audio {
    pub const SUBCLASS_UNDEFINED: u8 = 0x00;
    pub const SUBCLASS_AUDIO_CONTROL: u8 = 0x01;
    pub const SUBCLASS_AUDIO_STREAMING: u8 = 0x02;

    pub const PROTOCOL_UAC2: u8 = 0x20;
    pub const PROTOCOL_UAC3: u8 = 0x30;

    /// UAC3 basic audio device function subclass
    pub const FUNCTION_SUBCLASS_BADD_SPEAKER: u8 = 0x22;

    pub const BCD_ADC_2_0: u16 = 0x0200;

    pub const CATEGORY_DESKTOP_SPEAKER: u8 = 0x01;
    pub const CATEGORY_MICROPHONE: u8 = 0x03;

    pub const AC_SUBTYPE_HEADER: u8 = 0x01;
    pub const AC_SUBTYPE_INPUT_TERMINAL: u8 = 0x02;
    pub const AC_SUBTYPE_OUTPUT_TERMINAL: u8 = 0x03;
    pub const AC_SUBTYPE_FEATURE_UNIT: u8 = 0x06;
    pub const AC_SUBTYPE_CLOCK_SOURCE: u8 = 0x0A;

    pub const AS_SUBTYPE_GENERAL: u8 = 0x01;
    pub const AS_SUBTYPE_FORMAT_TYPE: u8 = 0x02;
    pub const EP_SUBTYPE_GENERAL: u8 = 0x01;

    pub const TERMINAL_USB_STREAMING: u16 = 0x0101;
    pub const TERMINAL_MICROPHONE: u16 = 0x0201;
    pub const TERMINAL_SPEAKER: u16 = 0x0301;

    pub const FORMAT_TYPE_I: u8 = 0x01;
    pub const FORMAT_PCM: u32 = 0x0000_0001;

    pub const CLOCK_INTERNAL_FIXED: u8 = 0x01;
    pub const CLOCK_SYNCED_TO_SOF: u8 = 0x04;
    /// Sampling frequency control, host readable
    pub const CLOCK_CONTROL_FREQ_READ: u8 = 0x01;

    /// Feature unit controls: mute and volume, host programmable
    pub const FU_CONTROL_MUTE: u32 = 0x0000_0003;
    pub const FU_CONTROL_VOLUME: u32 = 0x0000_000C;

    /// Only nominal rate the composers support
    pub const SAMPLE_RATE_HZ: u32 = 48_000;
}
