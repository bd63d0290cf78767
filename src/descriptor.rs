//! Descriptor record kinds and their field tables.
//!
//! Offsets follow the USB 2.0, CDC 1.2, NCM 1.0 and Audio 2.0 specifications.
//! Every descriptor starts with `bLength` and `bDescriptorType`; class-specific
//! descriptors add `bDescriptorSubtype` at offset 2.

use crate::consts::{self, DescriptorType, audio, cdc};
use crate::error::{Error, Result};
use crate::record::{Field, Record};

/// Header fields are fixed when a descriptor is built; see [Descriptor::retag]
pub const LENGTH: Field = Field::int("bLength", 0, 1).read_only();
pub const DESCRIPTOR_TYPE: Field = Field::int("bDescriptorType", 1, 1).read_only();
pub const DESCRIPTOR_SUBTYPE: Field = Field::int("bDescriptorSubtype", 2, 1).read_only();

const HEADER: &[Field] = &[LENGTH, DESCRIPTOR_TYPE];

pub mod device {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const BCD_USB: Field = Field::int("bcdUSB", 2, 2);
    pub const DEVICE_CLASS: Field = Field::int("bDeviceClass", 4, 1);
    pub const DEVICE_SUBCLASS: Field = Field::int("bDeviceSubClass", 5, 1);
    pub const DEVICE_PROTOCOL: Field = Field::int("bDeviceProtocol", 6, 1);
    pub const MAX_PACKET_SIZE_0: Field = Field::int("bMaxPacketSize0", 7, 1);
    pub const ID_VENDOR: Field = Field::int("idVendor", 8, 2);
    pub const ID_PRODUCT: Field = Field::int("idProduct", 10, 2);
    pub const BCD_DEVICE: Field = Field::int("bcdDevice", 12, 2);
    pub const MANUFACTURER: Field = Field::string("iManufacturer", 14);
    pub const PRODUCT: Field = Field::string("iProduct", 15);
    pub const SERIAL_NUMBER: Field = Field::string("iSerialNumber", 16);
    pub const NUM_CONFIGURATIONS: Field = Field::int("bNumConfigurations", 17, 1);

    pub const LEN: usize = 18;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        BCD_USB,
        DEVICE_CLASS,
        DEVICE_SUBCLASS,
        DEVICE_PROTOCOL,
        MAX_PACKET_SIZE_0,
        ID_VENDOR,
        ID_PRODUCT,
        BCD_DEVICE,
        MANUFACTURER,
        PRODUCT,
        SERIAL_NUMBER,
        NUM_CONFIGURATIONS,
    ];
}

pub mod device_qualifier {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const BCD_USB: Field = Field::int("bcdUSB", 2, 2);
    pub const DEVICE_CLASS: Field = Field::int("bDeviceClass", 4, 1);
    pub const DEVICE_SUBCLASS: Field = Field::int("bDeviceSubClass", 5, 1);
    pub const DEVICE_PROTOCOL: Field = Field::int("bDeviceProtocol", 6, 1);
    pub const MAX_PACKET_SIZE_0: Field = Field::int("bMaxPacketSize0", 7, 1);
    pub const NUM_CONFIGURATIONS: Field = Field::int("bNumConfigurations", 8, 1);
    pub const RESERVED: Field = Field::int("bReserved", 9, 1);

    pub const LEN: usize = 10;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        BCD_USB,
        DEVICE_CLASS,
        DEVICE_SUBCLASS,
        DEVICE_PROTOCOL,
        MAX_PACKET_SIZE_0,
        NUM_CONFIGURATIONS,
        RESERVED,
    ];
}

/// Shared by the configuration and other-speed-configuration kinds
pub mod configuration {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const TOTAL_LENGTH: Field = Field::int("wTotalLength", 2, 2);
    pub const NUM_INTERFACES: Field = Field::int("bNumInterfaces", 4, 1);
    pub const CONFIGURATION_VALUE: Field = Field::int("bConfigurationValue", 5, 1);
    pub const CONFIGURATION: Field = Field::string("iConfiguration", 6);
    pub const ATTRIBUTES: Field = Field::int("bmAttributes", 7, 1).with_set_bits(0x80);
    pub const MAX_POWER: Field = Field::int("bMaxPower", 8, 1);

    pub const LEN: usize = 9;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        TOTAL_LENGTH,
        NUM_INTERFACES,
        CONFIGURATION_VALUE,
        CONFIGURATION,
        ATTRIBUTES,
        MAX_POWER,
    ];
}

pub mod interface {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const INTERFACE_NUMBER: Field = Field::int("bInterfaceNumber", 2, 1);
    pub const ALTERNATE_SETTING: Field = Field::int("bAlternateSetting", 3, 1);
    pub const NUM_ENDPOINTS: Field = Field::int("bNumEndpoints", 4, 1);
    pub const INTERFACE_CLASS: Field = Field::int("bInterfaceClass", 5, 1);
    pub const INTERFACE_SUBCLASS: Field = Field::int("bInterfaceSubClass", 6, 1);
    pub const INTERFACE_PROTOCOL: Field = Field::int("bInterfaceProtocol", 7, 1);
    pub const INTERFACE: Field = Field::string("iInterface", 8);

    pub const LEN: usize = 9;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        INTERFACE_NUMBER,
        ALTERNATE_SETTING,
        NUM_ENDPOINTS,
        INTERFACE_CLASS,
        INTERFACE_SUBCLASS,
        INTERFACE_PROTOCOL,
        INTERFACE,
    ];
}

pub mod interface_association {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const FIRST_INTERFACE: Field = Field::int("bFirstInterface", 2, 1);
    pub const INTERFACE_COUNT: Field = Field::int("bInterfaceCount", 3, 1);
    pub const FUNCTION_CLASS: Field = Field::int("bFunctionClass", 4, 1);
    pub const FUNCTION_SUBCLASS: Field = Field::int("bFunctionSubClass", 5, 1);
    pub const FUNCTION_PROTOCOL: Field = Field::int("bFunctionProtocol", 6, 1);
    pub const FUNCTION: Field = Field::string("iFunction", 7);

    pub const LEN: usize = 8;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        FIRST_INTERFACE,
        INTERFACE_COUNT,
        FUNCTION_CLASS,
        FUNCTION_SUBCLASS,
        FUNCTION_PROTOCOL,
        FUNCTION,
    ];
}

pub mod endpoint {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const ENDPOINT_ADDRESS: Field = Field::int("bEndpointAddress", 2, 1);
    pub const ATTRIBUTES: Field = Field::int("bmAttributes", 3, 1);
    pub const MAX_PACKET_SIZE: Field = Field::int("wMaxPacketSize", 4, 2);
    pub const INTERVAL: Field = Field::int("bInterval", 6, 1);

    pub const LEN: usize = 7;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        ENDPOINT_ADDRESS,
        ATTRIBUTES,
        MAX_PACKET_SIZE,
        INTERVAL,
    ];
}

pub mod string_languages {
    use super::{DESCRIPTOR_TYPE, Field, LENGTH};

    pub const LANGID: Field = Field::int("wLANGID", 2, 2);

    pub const LEN: usize = 4;
    pub const FIELDS: &[Field] = &[LENGTH, DESCRIPTOR_TYPE, LANGID];
}

pub mod cdc_header {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const BCD_CDC: Field = Field::int("bcdCDC", 3, 2);

    pub const LEN: usize = 5;
    pub const FIELDS: &[Field] = &[LENGTH, DESCRIPTOR_TYPE, DESCRIPTOR_SUBTYPE, BCD_CDC];
}

pub mod cdc_call_management {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const CAPABILITIES: Field = Field::int("bmCapabilities", 3, 1);
    pub const DATA_INTERFACE: Field = Field::int("bDataInterface", 4, 1);

    pub const LEN: usize = 5;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        CAPABILITIES,
        DATA_INTERFACE,
    ];
}

pub mod cdc_acm {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const CAPABILITIES: Field = Field::int("bmCapabilities", 3, 1);

    pub const LEN: usize = 4;
    pub const FIELDS: &[Field] = &[LENGTH, DESCRIPTOR_TYPE, DESCRIPTOR_SUBTYPE, CAPABILITIES];
}

/// Followed by one `bSubordinateInterface` byte per subordinate
pub mod cdc_union {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const CONTROL_INTERFACE: Field = Field::int("bControlInterface", 3, 1);

    pub const LEN: usize = 4;
    pub const FIELDS: &[Field] = &[LENGTH, DESCRIPTOR_TYPE, DESCRIPTOR_SUBTYPE, CONTROL_INTERFACE];
}

pub mod cdc_ethernet {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const MAC_ADDRESS: Field = Field::string("iMACAddress", 3);
    pub const ETHERNET_STATISTICS: Field = Field::int("bmEthernetStatistics", 4, 4);
    pub const MAX_SEGMENT_SIZE: Field = Field::int("wMaxSegmentSize", 8, 2);
    pub const NUMBER_MC_FILTERS: Field = Field::int("wNumberMCFilters", 10, 2);
    pub const NUMBER_POWER_FILTERS: Field = Field::int("bNumberPowerFilters", 12, 1);

    pub const LEN: usize = 13;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        MAC_ADDRESS,
        ETHERNET_STATISTICS,
        MAX_SEGMENT_SIZE,
        NUMBER_MC_FILTERS,
        NUMBER_POWER_FILTERS,
    ];
}

pub mod cdc_ncm {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const BCD_NCM_VERSION: Field = Field::int("bcdNcmVersion", 3, 2);
    pub const NETWORK_CAPABILITIES: Field = Field::int("bmNetworkCapabilities", 5, 1);

    pub const LEN: usize = 6;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        BCD_NCM_VERSION,
        NETWORK_CAPABILITIES,
    ];
}

pub mod ac_header {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const BCD_ADC: Field = Field::int("bcdADC", 3, 2);
    pub const CATEGORY: Field = Field::int("bCategory", 5, 1);
    pub const TOTAL_LENGTH: Field = Field::int("wTotalLength", 6, 2);
    pub const CONTROLS: Field = Field::int("bmControls", 8, 1);

    pub const LEN: usize = 9;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        BCD_ADC,
        CATEGORY,
        TOTAL_LENGTH,
        CONTROLS,
    ];
}

pub mod clock_source {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const CLOCK_ID: Field = Field::int("bClockID", 3, 1);
    pub const ATTRIBUTES: Field = Field::int("bmAttributes", 4, 1);
    pub const CONTROLS: Field = Field::int("bmControls", 5, 1);
    pub const ASSOC_TERMINAL: Field = Field::int("bAssocTerminal", 6, 1);
    pub const CLOCK_SOURCE: Field = Field::string("iClockSource", 7);

    pub const LEN: usize = 8;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        CLOCK_ID,
        ATTRIBUTES,
        CONTROLS,
        ASSOC_TERMINAL,
        CLOCK_SOURCE,
    ];
}

pub mod input_terminal {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const TERMINAL_ID: Field = Field::int("bTerminalID", 3, 1);
    pub const TERMINAL_TYPE: Field = Field::int("wTerminalType", 4, 2);
    pub const ASSOC_TERMINAL: Field = Field::int("bAssocTerminal", 6, 1);
    pub const CLOCK_SOURCE_ID: Field = Field::int("bCSourceID", 7, 1);
    pub const NR_CHANNELS: Field = Field::int("bNrChannels", 8, 1);
    pub const CHANNEL_CONFIG: Field = Field::int("bmChannelConfig", 9, 4);
    pub const CHANNEL_NAMES: Field = Field::string("iChannelNames", 13);
    pub const CONTROLS: Field = Field::int("bmControls", 14, 2);
    pub const TERMINAL: Field = Field::string("iTerminal", 16);

    pub const LEN: usize = 17;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        TERMINAL_ID,
        TERMINAL_TYPE,
        ASSOC_TERMINAL,
        CLOCK_SOURCE_ID,
        NR_CHANNELS,
        CHANNEL_CONFIG,
        CHANNEL_NAMES,
        CONTROLS,
        TERMINAL,
    ];
}

pub mod output_terminal {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const TERMINAL_ID: Field = Field::int("bTerminalID", 3, 1);
    pub const TERMINAL_TYPE: Field = Field::int("wTerminalType", 4, 2);
    pub const ASSOC_TERMINAL: Field = Field::int("bAssocTerminal", 6, 1);
    pub const SOURCE_ID: Field = Field::int("bSourceID", 7, 1);
    pub const CLOCK_SOURCE_ID: Field = Field::int("bCSourceID", 8, 1);
    pub const CONTROLS: Field = Field::int("bmControls", 9, 2);
    pub const TERMINAL: Field = Field::string("iTerminal", 11);

    pub const LEN: usize = 12;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        TERMINAL_ID,
        TERMINAL_TYPE,
        ASSOC_TERMINAL,
        SOURCE_ID,
        CLOCK_SOURCE_ID,
        CONTROLS,
        TERMINAL,
    ];
}

/// Followed by one 4-byte `bmaControls` per channel (master first) and `iFeature`
pub mod feature_unit {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const UNIT_ID: Field = Field::int("bUnitID", 3, 1);
    pub const SOURCE_ID: Field = Field::int("bSourceID", 4, 1);

    pub const LEN: usize = 6;
    pub const FIELDS: &[Field] = &[LENGTH, DESCRIPTOR_TYPE, DESCRIPTOR_SUBTYPE, UNIT_ID, SOURCE_ID];
}

pub mod as_general {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const TERMINAL_LINK: Field = Field::int("bTerminalLink", 3, 1);
    pub const CONTROLS: Field = Field::int("bmControls", 4, 1);
    pub const FORMAT_TYPE: Field = Field::int("bFormatType", 5, 1);
    pub const FORMATS: Field = Field::int("bmFormats", 6, 4);
    pub const NR_CHANNELS: Field = Field::int("bNrChannels", 10, 1);
    pub const CHANNEL_CONFIG: Field = Field::int("bmChannelConfig", 11, 4);
    pub const CHANNEL_NAMES: Field = Field::string("iChannelNames", 15);

    pub const LEN: usize = 16;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        TERMINAL_LINK,
        CONTROLS,
        FORMAT_TYPE,
        FORMATS,
        NR_CHANNELS,
        CHANNEL_CONFIG,
        CHANNEL_NAMES,
    ];
}

pub mod format_type_i {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const FORMAT_TYPE: Field = Field::int("bFormatType", 3, 1);
    pub const SUBSLOT_SIZE: Field = Field::int("bSubslotSize", 4, 1);
    pub const BIT_RESOLUTION: Field = Field::int("bBitResolution", 5, 1);

    pub const LEN: usize = 6;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        FORMAT_TYPE,
        SUBSLOT_SIZE,
        BIT_RESOLUTION,
    ];
}

pub mod as_iso_endpoint {
    use super::{DESCRIPTOR_SUBTYPE, DESCRIPTOR_TYPE, Field, LENGTH};

    pub const ATTRIBUTES: Field = Field::int("bmAttributes", 3, 1);
    pub const CONTROLS: Field = Field::int("bmControls", 4, 1);
    pub const LOCK_DELAY_UNITS: Field = Field::int("bLockDelayUnits", 5, 1);
    pub const LOCK_DELAY: Field = Field::int("wLockDelay", 6, 2);

    pub const LEN: usize = 8;
    pub const FIELDS: &[Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        DESCRIPTOR_SUBTYPE,
        ATTRIBUTES,
        CONTROLS,
        LOCK_DELAY_UNITS,
        LOCK_DELAY,
    ];
}

/// Every record kind the context knows how to build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescKind {
    Device,
    DeviceQualifier,
    Configuration,
    OtherSpeedConfiguration,
    Interface,
    InterfaceAssociation,
    Endpoint,
    StringLanguages,
    String,
    Sentinel,
    CdcHeader,
    CdcCallManagement,
    CdcAcm,
    CdcUnion,
    CdcEthernet,
    CdcNcm,
    AcHeader,
    ClockSource,
    InputTerminal,
    OutputTerminal,
    FeatureUnit,
    AsGeneral,
    FormatTypeI,
    AsIsoEndpoint,
}

impl DescKind {
    /// Label used in emitted tables
    pub fn name(self) -> &'static str {
        use DescKind::*;
        match self {
            Device => "DeviceDesc",
            DeviceQualifier => "DeviceQualifierDesc",
            Configuration => "ConfigurationDesc",
            OtherSpeedConfiguration => "OtherSpeedConfigurationDesc",
            Interface => "InterfaceDesc",
            InterfaceAssociation => "InterfaceAssociationDesc",
            Endpoint => "EndpointDesc",
            StringLanguages => "StringLanguagesDesc",
            String => "StringDesc",
            Sentinel => "SentinelDesc",
            CdcHeader => "CDCFuncHeaderDesc",
            CdcCallManagement => "CDCFuncCallManagementDesc",
            CdcAcm => "CDCFuncACMDesc",
            CdcUnion => "CDCFuncUnionDesc",
            CdcEthernet => "CDCFuncEthernetDesc",
            CdcNcm => "CDCFuncNCMDesc",
            AcHeader => "UAC2ACHeaderDesc",
            ClockSource => "UAC2ClockSourceDesc",
            InputTerminal => "UAC2InputTerminalDesc",
            OutputTerminal => "UAC2OutputTerminalDesc",
            FeatureUnit => "UAC2FeatureUnitDesc",
            AsGeneral => "UAC2ASGeneralDesc",
            FormatTypeI => "UAC2FormatTypeIDesc",
            AsIsoEndpoint => "UAC2ASIsoEndpointDesc",
        }
    }

    pub fn descriptor_type(self) -> DescriptorType {
        use DescKind::*;
        match self {
            Device => DescriptorType::Device,
            DeviceQualifier => DescriptorType::DeviceQualifier,
            Configuration => DescriptorType::Configuration,
            OtherSpeedConfiguration => DescriptorType::OtherSpeedConfiguration,
            Interface => DescriptorType::Interface,
            InterfaceAssociation => DescriptorType::InterfaceAssociation,
            Endpoint => DescriptorType::Endpoint,
            StringLanguages | String => DescriptorType::String,
            Sentinel => DescriptorType::Sentinel,
            AsIsoEndpoint => DescriptorType::CsEndpoint,
            CdcHeader | CdcCallManagement | CdcAcm | CdcUnion | CdcEthernet | CdcNcm | AcHeader
            | ClockSource | InputTerminal | OutputTerminal | FeatureUnit | AsGeneral
            | FormatTypeI => DescriptorType::CsInterface,
        }
    }

    pub fn subtype(self) -> Option<u8> {
        use DescKind::*;
        let subtype = match self {
            CdcHeader => cdc::SUBTYPE_HEADER,
            CdcCallManagement => cdc::SUBTYPE_CALL_MANAGEMENT,
            CdcAcm => cdc::SUBTYPE_ACM,
            CdcUnion => cdc::SUBTYPE_UNION,
            CdcEthernet => cdc::SUBTYPE_ETHERNET,
            CdcNcm => cdc::SUBTYPE_NCM,
            AcHeader => audio::AC_SUBTYPE_HEADER,
            ClockSource => audio::AC_SUBTYPE_CLOCK_SOURCE,
            InputTerminal => audio::AC_SUBTYPE_INPUT_TERMINAL,
            OutputTerminal => audio::AC_SUBTYPE_OUTPUT_TERMINAL,
            FeatureUnit => audio::AC_SUBTYPE_FEATURE_UNIT,
            AsGeneral => audio::AS_SUBTYPE_GENERAL,
            FormatTypeI => audio::AS_SUBTYPE_FORMAT_TYPE,
            AsIsoEndpoint => audio::EP_SUBTYPE_GENERAL,
            _ => return None,
        };
        Some(subtype)
    }

    /// Length without any variable tail
    pub fn base_len(self) -> usize {
        use DescKind::*;
        match self {
            Device => device::LEN,
            DeviceQualifier => device_qualifier::LEN,
            Configuration | OtherSpeedConfiguration => configuration::LEN,
            Interface => interface::LEN,
            InterfaceAssociation => interface_association::LEN,
            Endpoint => endpoint::LEN,
            StringLanguages => string_languages::LEN,
            String | Sentinel => 2,
            CdcHeader => cdc_header::LEN,
            CdcCallManagement => cdc_call_management::LEN,
            CdcAcm => cdc_acm::LEN,
            CdcUnion => cdc_union::LEN,
            CdcEthernet => cdc_ethernet::LEN,
            CdcNcm => cdc_ncm::LEN,
            AcHeader => ac_header::LEN,
            ClockSource => clock_source::LEN,
            InputTerminal => input_terminal::LEN,
            OutputTerminal => output_terminal::LEN,
            FeatureUnit => feature_unit::LEN,
            AsGeneral => as_general::LEN,
            FormatTypeI => format_type_i::LEN,
            AsIsoEndpoint => as_iso_endpoint::LEN,
        }
    }

    pub fn fields(self) -> &'static [Field] {
        use DescKind::*;
        match self {
            Device => device::FIELDS,
            DeviceQualifier => device_qualifier::FIELDS,
            Configuration | OtherSpeedConfiguration => configuration::FIELDS,
            Interface => interface::FIELDS,
            InterfaceAssociation => interface_association::FIELDS,
            Endpoint => endpoint::FIELDS,
            StringLanguages => string_languages::FIELDS,
            String | Sentinel => HEADER,
            CdcHeader => cdc_header::FIELDS,
            CdcCallManagement => cdc_call_management::FIELDS,
            CdcAcm => cdc_acm::FIELDS,
            CdcUnion => cdc_union::FIELDS,
            CdcEthernet => cdc_ethernet::FIELDS,
            CdcNcm => cdc_ncm::FIELDS,
            AcHeader => ac_header::FIELDS,
            ClockSource => clock_source::FIELDS,
            InputTerminal => input_terminal::FIELDS,
            OutputTerminal => output_terminal::FIELDS,
            FeatureUnit => feature_unit::FIELDS,
            AsGeneral => as_general::FIELDS,
            FormatTypeI => format_type_i::FIELDS,
            AsIsoEndpoint => as_iso_endpoint::FIELDS,
        }
    }

    fn defaults(self) -> &'static [(Field, u32)] {
        use DescKind::*;
        match self {
            Device => &[
                (device::BCD_USB, consts::BCD_USB_2_0 as u32),
                (device::MAX_PACKET_SIZE_0, 64),
            ],
            DeviceQualifier => &[(device_qualifier::BCD_USB, consts::BCD_USB_2_0 as u32)],
            Configuration | OtherSpeedConfiguration => &[(configuration::ATTRIBUTES, 0)],
            StringLanguages => &[(string_languages::LANGID, consts::LANGID_EN_US as u32)],
            CdcHeader => &[(cdc_header::BCD_CDC, cdc::BCD_CDC as u32)],
            CdcEthernet => &[
                (cdc_ethernet::MAX_SEGMENT_SIZE, cdc::ETH_MAX_SEGMENT_SIZE as u32),
                (cdc_ethernet::NUMBER_MC_FILTERS, cdc::ETH_MC_PERFECT as u32),
            ],
            CdcNcm => &[(cdc_ncm::BCD_NCM_VERSION, cdc::BCD_NCM as u32)],
            AcHeader => &[(ac_header::BCD_ADC, audio::BCD_ADC_2_0 as u32)],
            AsGeneral => &[
                (as_general::FORMAT_TYPE, audio::FORMAT_TYPE_I as u32),
                (as_general::FORMATS, audio::FORMAT_PCM),
            ],
            FormatTypeI => &[(format_type_i::FORMAT_TYPE, audio::FORMAT_TYPE_I as u32)],
            _ => &[],
        }
    }
}

/// One descriptor: a record plus the kind that gives meaning to its bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    kind: DescKind,
    record: Record,
}

impl Descriptor {
    /// Build a descriptor of `kind` with its base length and default field values
    pub fn new(kind: DescKind) -> Self {
        Self::with_len(kind, kind.base_len())
    }

    fn with_len(kind: DescKind, len: usize) -> Self {
        let mut record = Record::zeroed(len);
        record.put(&LENGTH, len as u32);
        record.put(&DESCRIPTOR_TYPE, kind.descriptor_type() as u32);
        if let Some(subtype) = kind.subtype() {
            record.put(&DESCRIPTOR_SUBTYPE, subtype as u32);
        }
        for (field, value) in kind.defaults() {
            record.put(field, *value);
        }
        Self { kind, record }
    }

    /// Like `with_len` for kinds with a variable tail; `bLength` is a single byte
    fn with_tail(kind: DescKind, len: usize) -> Result<Self> {
        if len > u8::MAX as usize {
            return Err(Error::InvalidLayout(format!(
                "{} of {len} bytes does not fit bLength",
                kind.name()
            )));
        }
        Ok(Self::with_len(kind, len))
    }

    /// String descriptor carrying `s` as UTF-16LE
    pub fn string(s: &str) -> Result<Self> {
        let encoded: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut desc = Self::with_tail(DescKind::String, 2 + encoded.len())?;
        desc.record.bytes_mut()[2..].copy_from_slice(&encoded);
        Ok(desc)
    }

    /// Union functional descriptor with room for `subordinates` interfaces
    pub fn union(subordinates: usize) -> Result<Self> {
        Self::with_tail(DescKind::CdcUnion, cdc_union::LEN + subordinates)
    }

    /// Feature unit covering the master channel plus `channels` logical channels
    pub fn feature_unit(channels: u8) -> Result<Self> {
        Self::with_tail(
            DescKind::FeatureUnit,
            feature_unit::LEN + 4 * (channels as usize + 1),
        )
    }

    pub fn kind(&self) -> DescKind {
        self.kind
    }

    /// Tag byte actually stored in the record
    pub fn descriptor_type(&self) -> u8 {
        self.record.get(&DESCRIPTOR_TYPE) as u8
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        self.record.bytes()
    }

    pub fn get(&self, field: &Field) -> u32 {
        self.record.get(field)
    }

    /// Look up a field of this kind by its USB name, e.g. `"idVendor"`
    pub fn field(&self, name: &str) -> Result<&'static Field> {
        self.kind
            .fields()
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::NotFound(format!("field {name} in {}", self.kind.name())))
    }

    pub fn field_offset(&self, name: &str) -> Result<usize> {
        Ok(self.field(name)?.offset)
    }

    pub fn get_by_name(&self, name: &str) -> Result<u32> {
        Ok(self.get(self.field(name)?))
    }

    /// Fails unless `field` is one of this kind's fields and writable after construction
    pub fn check_writable(&self, field: &Field) -> Result<()> {
        if !self.kind.fields().contains(field) {
            return Err(Error::NotFound(format!(
                "field {} in {}",
                field.name,
                self.kind.name()
            )));
        }
        if field.read_only {
            return Err(Error::InvalidLayout(format!(
                "{} of {} is fixed at construction",
                field.name,
                self.kind.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn put(&mut self, field: &Field, value: u32) -> Result<()> {
        self.check_writable(field)?;
        self.record.put(field, value);
        Ok(())
    }

    /// Write a field derived on finalize; `field` always belongs to this kind
    pub(crate) fn put_resolved(&mut self, field: &Field, value: u32) {
        self.record.put(field, value);
    }

    /// Fresh descriptor of the same kind carrying the same field values
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::with_len(self.kind, self.len());
        for field in self.kind.fields() {
            copy.record.put(field, self.record.get(field));
        }
        let tail = self.kind.base_len();
        copy.record.bytes_mut()[tail..].copy_from_slice(&self.record.bytes()[tail..]);
        copy
    }

    /// Switch between the configuration and other-speed-configuration tags
    pub fn retag(&mut self, kind: DescKind) -> Result<()> {
        use DescKind::{Configuration, OtherSpeedConfiguration};
        match (self.kind, kind) {
            (Configuration, OtherSpeedConfiguration) | (OtherSpeedConfiguration, Configuration) => {
                self.kind = kind;
                self.record.put(&DESCRIPTOR_TYPE, kind.descriptor_type() as u32);
                Ok(())
            }
            (from, to) => Err(Error::UnsupportedConfiguration(format!(
                "cannot retag {} as {}",
                from.name(),
                to.name()
            ))),
        }
    }

    fn union_slot(&self, n: usize) -> Result<usize> {
        if self.kind != DescKind::CdcUnion {
            return Err(Error::InvalidLayout(format!(
                "{} has no subordinate interfaces",
                self.kind.name()
            )));
        }
        let pos = cdc_union::LEN + n;
        if pos >= self.len() {
            return Err(Error::InvalidLayout(format!(
                "subordinate interface {n} out of range ({} declared)",
                self.len() - cdc_union::LEN
            )));
        }
        Ok(pos)
    }

    pub fn subordinate_interface(&self, n: usize) -> Result<u8> {
        Ok(self.bytes()[self.union_slot(n)?])
    }

    pub(crate) fn put_subordinate_interface(&mut self, n: usize, value: u8) -> Result<()> {
        let pos = self.union_slot(n)?;
        self.record.bytes_mut()[pos] = value;
        Ok(())
    }

    fn feature_slot(&self, channel: usize) -> Result<Field> {
        if self.kind != DescKind::FeatureUnit {
            return Err(Error::InvalidLayout(format!(
                "{} has no channel controls",
                self.kind.name()
            )));
        }
        let offset = feature_unit::LEN - 1 + 4 * channel;
        // the trailing iFeature byte is not a control slot
        if offset + 4 >= self.len() {
            return Err(Error::InvalidLayout(format!(
                "feature unit channel {channel} out of range"
            )));
        }
        Ok(Field::int("bmaControls", offset, 4))
    }

    /// Controls of channel `channel`; channel 0 is the master channel
    pub fn feature_controls(&self, channel: usize) -> Result<u32> {
        Ok(self.record.get(&self.feature_slot(channel)?))
    }

    pub(crate) fn put_feature_controls(&mut self, channel: usize, value: u32) -> Result<()> {
        let slot = self.feature_slot(channel)?;
        self.record.put(&slot, value);
        Ok(())
    }

    /// Decoded text of a string descriptor
    pub fn text(&self) -> Option<String> {
        if self.kind != DescKind::String {
            return None;
        }
        let units: Vec<u16> = self.bytes()[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok()
    }
}
