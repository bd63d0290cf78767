//! CDC functions: ACM serial port, ECM and NCM Ethernet adapters
use crate::consts::cdc::*;
use crate::consts::{AcmCapabilities, ClassCode, ENDPOINT_IN, ENDPOINT_OUT, NcmCapabilities, Speed};
use crate::context::Context;
use crate::descriptor::{DescKind, cdc_acm, cdc_call_management, cdc_ethernet, cdc_ncm, cdc_union};
use crate::error::{Error, Result};
use log::*;
use super::{Allocation, Cursor, EndpointKind, add_association, add_endpoint, add_interface};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options of the ACM serial function
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AcmOptions {
    pub function_name: Option<String>,
    /// Advertise SEND_BREAK
    pub send_break: bool,
    /// Advertise line coding and control line state requests
    pub line_state: bool,
    /// Bulk packet size; the speed's maximum if unset
    pub max_packet_size: Option<u16>,
}

impl Default for AcmOptions {
    fn default() -> Self {
        Self {
            function_name: Some("CDC ACM".to_string()),
            send_break: true,
            line_state: true,
            max_packet_size: None,
        }
    }
}

/// Options of the ECM and NCM Ethernet functions
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EthernetOptions {
    pub function_name: Option<String>,
    /// Device MAC address as 12 hex digits, e.g. `"02A0B1C2D3E4"`
    pub mac_address: String,
    pub max_segment_size: u16,
    /// Bulk packet size; the speed's maximum if unset
    pub max_packet_size: Option<u16>,
    /// NCM only: advertise CRC mode
    pub crc_mode: bool,
}

impl Default for EthernetOptions {
    fn default() -> Self {
        Self {
            function_name: None,
            // locally administered
            mac_address: "020000000001".to_string(),
            max_segment_size: ETH_MAX_SEGMENT_SIZE,
            max_packet_size: None,
            crc_mode: false,
        }
    }
}

impl EthernetOptions {
    pub fn ecm(mac_address: &str) -> Self {
        Self {
            function_name: Some("CDC ECM".to_string()),
            mac_address: mac_address.to_string(),
            ..Default::default()
        }
    }

    pub fn ncm(mac_address: &str) -> Self {
        Self {
            function_name: Some("CDC NCM".to_string()),
            mac_address: mac_address.to_string(),
            ..Default::default()
        }
    }
}

fn check_mac(mac: &str) -> Result<()> {
    if mac.len() != 12 || !mac.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::UnsupportedConfiguration(format!(
            "invalid MAC address {mac:?}, must be 12 hex digits"
        )));
    }
    Ok(())
}

fn add_union(ctx: &mut Context, control: u8, subordinate: u8) -> Result<()> {
    ctx.add_union(1)?
        .set(&cdc_union::CONTROL_INTERFACE, control as u32)?
        .set_subordinate_interface(0, subordinate)?;
    Ok(())
}

fn add_bulk_pair(ctx: &mut Context, ep: u8, speed: Speed, size: Option<u16>) -> Result<()> {
    add_endpoint(ctx, ENDPOINT_IN | ep, EndpointKind::BULK, speed, size)?;
    add_endpoint(ctx, ENDPOINT_OUT | ep, EndpointKind::BULK, speed, size)?;
    Ok(())
}

/// Append an ACM serial function
///
/// Layout: association, communication interface with header, call management, ACM
/// and union descriptors, notification endpoint at `at.endpoint + 1`, then the data
/// interface with a bulk pair at `at.endpoint`.
pub fn add_acm(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &AcmOptions,
) -> Result<Allocation> {
    let used = Allocation::new(2, 2);
    at.reserve(used)?;
    let comm = at.interface;
    let data = comm + 1;
    let name = opts.function_name.as_deref();
    debug!("Adding CDC ACM at interface {comm}, endpoint {}", at.endpoint);

    let class = (ClassCode::CDC as u8, SUBCLASS_ACM, PROTOCOL_NONE);
    add_association(ctx, comm, 2, class, name)?;
    add_interface(ctx, comm, 0, class, name)?;
    ctx.add(DescKind::CdcHeader)?;
    ctx.add(DescKind::CdcCallManagement)?
        .set(&cdc_call_management::DATA_INTERFACE, data as u32)?;
    let mut caps = AcmCapabilities::empty();
    if opts.line_state {
        caps |= AcmCapabilities::LINE_CODING;
    }
    if opts.send_break {
        caps |= AcmCapabilities::SEND_BREAK;
    }
    ctx.add(DescKind::CdcAcm)?
        .set(&cdc_acm::CAPABILITIES, caps.bits() as u32)?;
    add_union(ctx, comm, data)?;
    // unused, but the Linux cdc-acm driver refuses to bind without it
    add_endpoint(
        ctx,
        ENDPOINT_IN | (at.endpoint + 1),
        EndpointKind::INTERRUPT,
        speed,
        None,
    )?;

    let data_class = (ClassCode::CDCData as u8, DATA_SUBCLASS_NONE, DATA_PROTOCOL_NONE);
    add_interface(ctx, data, 0, data_class, None)?;
    add_bulk_pair(ctx, at.endpoint, speed, opts.max_packet_size)?;
    Ok(used)
}

/// Append an ECM Ethernet function
pub fn add_ecm(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &EthernetOptions,
) -> Result<Allocation> {
    add_ethernet(ctx, at, speed, opts, false)
}

/// Append an NCM Ethernet function; its data interface speaks NTB16
pub fn add_ncm(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &EthernetOptions,
) -> Result<Allocation> {
    add_ethernet(ctx, at, speed, opts, true)
}

fn add_ethernet(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &EthernetOptions,
    ncm: bool,
) -> Result<Allocation> {
    check_mac(&opts.mac_address)?;
    let used = Allocation::new(2, 2);
    at.reserve(used)?;
    let comm = at.interface;
    let data = comm + 1;
    let name = opts.function_name.as_deref();
    let (subclass, data_protocol) = if ncm {
        (SUBCLASS_NCM, DATA_PROTOCOL_NTB)
    } else {
        (SUBCLASS_ECM, DATA_PROTOCOL_NONE)
    };
    debug!(
        "Adding CDC {} at interface {comm}, endpoint {}",
        if ncm { "NCM" } else { "ECM" },
        at.endpoint
    );

    let class = (ClassCode::CDC as u8, subclass, PROTOCOL_NONE);
    add_association(ctx, comm, 2, class, name)?;
    add_interface(ctx, comm, 0, class, name)?;
    ctx.add(DescKind::CdcHeader)?;
    add_union(ctx, comm, data)?;
    ctx.add(DescKind::CdcEthernet)?
        .set_string(&cdc_ethernet::MAC_ADDRESS, &opts.mac_address)?
        .set(&cdc_ethernet::MAX_SEGMENT_SIZE, opts.max_segment_size as u32)?;
    if ncm {
        let mut caps = NcmCapabilities::empty();
        if opts.crc_mode {
            caps |= NcmCapabilities::CRC_MODE;
        }
        ctx.add(DescKind::CdcNcm)?
            .set(&cdc_ncm::NETWORK_CAPABILITIES, caps.bits() as u32)?;
    }
    add_endpoint(
        ctx,
        ENDPOINT_IN | (at.endpoint + 1),
        EndpointKind::INTERRUPT,
        speed,
        None,
    )?;

    // alternate setting 0 has no endpoints and keeps the link down
    let data_class = (ClassCode::CDCData as u8, DATA_SUBCLASS_NONE, data_protocol);
    add_interface(ctx, data, 0, data_class, None)?;
    add_interface(ctx, data, 1, data_class, None)?;
    add_bulk_pair(ctx, at.endpoint, speed, opts.max_packet_size)?;
    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Descriptor, endpoint, interface};

    fn kinds(ctx: &Context) -> Vec<DescKind> {
        ctx.iter().map(|(_, d)| d.kind()).collect()
    }

    fn endpoints(ctx: &Context) -> Vec<&Descriptor> {
        ctx.iter()
            .map(|(_, d)| d)
            .filter(|d| d.kind() == DescKind::Endpoint)
            .collect()
    }

    #[test]
    fn acm_layout() {
        let mut ctx = Context::new();
        let opts = AcmOptions::default();
        let used = add_acm(&mut ctx, Cursor::new(0, 1), Speed::High, &opts).unwrap();
        assert_eq!(used, Allocation::new(2, 2));
        use DescKind::*;
        assert_eq!(
            kinds(&ctx),
            [
                InterfaceAssociation,
                Interface,
                CdcHeader,
                CdcCallManagement,
                CdcAcm,
                CdcUnion,
                Endpoint,
                Interface,
                Endpoint,
                Endpoint
            ]
        );
        let eps = endpoints(&ctx);
        assert_eq!(eps[0].get(&endpoint::ENDPOINT_ADDRESS), 0x82);
        assert_eq!(eps[0].get(&endpoint::ATTRIBUTES), 0x03);
        assert_eq!(eps[1].get(&endpoint::ENDPOINT_ADDRESS), 0x81);
        assert_eq!(eps[1].get(&endpoint::MAX_PACKET_SIZE), 512);
        assert_eq!(eps[2].get(&endpoint::ENDPOINT_ADDRESS), 0x01);
    }

    #[test]
    fn acm_capabilities_and_full_speed() {
        let mut ctx = Context::new();
        let opts = AcmOptions {
            send_break: false,
            ..Default::default()
        };
        add_acm(&mut ctx, Cursor::new(2, 3), Speed::Full, &opts).unwrap();
        let acm = ctx.iter().find(|(_, d)| d.kind() == DescKind::CdcAcm).unwrap().1;
        assert_eq!(acm.get(&cdc_acm::CAPABILITIES), 0x02);
        let union = ctx.iter().find(|(_, d)| d.kind() == DescKind::CdcUnion).unwrap().1;
        assert_eq!(union.get(&cdc_union::CONTROL_INTERFACE), 2);
        assert_eq!(union.subordinate_interface(0).unwrap(), 3);
        let eps = endpoints(&ctx);
        assert_eq!(eps[0].get(&endpoint::INTERVAL), 255);
        assert_eq!(eps[1].get(&endpoint::MAX_PACKET_SIZE), 64);
    }

    #[test]
    fn ncm_data_interface_alternates() {
        let mut ctx = Context::new();
        let opts = EthernetOptions {
            crc_mode: true,
            ..EthernetOptions::ncm("02DEADBEEF01")
        };
        add_ncm(&mut ctx, Cursor::new(0, 1), Speed::High, &opts).unwrap();
        let ifcs: Vec<_> = ctx
            .iter()
            .map(|(_, d)| d)
            .filter(|d| d.kind() == DescKind::Interface)
            .map(|d| {
                (
                    d.get(&interface::INTERFACE_NUMBER),
                    d.get(&interface::ALTERNATE_SETTING),
                    d.get(&interface::INTERFACE_PROTOCOL),
                )
            })
            .collect();
        assert_eq!(ifcs, [(0, 0, 0), (1, 0, 1), (1, 1, 1)]);
        let ncm = ctx.iter().find(|(_, d)| d.kind() == DescKind::CdcNcm).unwrap().1;
        assert_eq!(ncm.get(&cdc_ncm::NETWORK_CAPABILITIES), 0x10);
        let eth = ctx.iter().find(|(_, d)| d.kind() == DescKind::CdcEthernet).unwrap();
        assert_eq!(
            ctx.get_string(eth.0, &cdc_ethernet::MAC_ADDRESS).unwrap(),
            Some("02DEADBEEF01")
        );
    }

    #[test]
    fn ecm_has_no_ncm_descriptor() {
        let mut ctx = Context::new();
        let opts = EthernetOptions::ecm("020000000002");
        add_ecm(&mut ctx, Cursor::default(), Speed::High, &opts).unwrap();
        assert!(!kinds(&ctx).contains(&DescKind::CdcNcm));
    }

    #[test]
    fn bad_mac_rejected() {
        let mut ctx = Context::new();
        for mac in ["0200000001", "02000000000G", "02:00:00:00:00:01"] {
            let res = add_ecm(&mut ctx, Cursor::default(), Speed::High, &EthernetOptions::ecm(mac));
            assert!(matches!(res, Err(Error::UnsupportedConfiguration(_))));
        }
        assert!(ctx.is_empty());
    }

    #[test]
    fn numbering_must_fit() {
        let mut ctx = Context::new();
        let acm = AcmOptions::default();
        let res = add_acm(&mut ctx, Cursor::new(255, 1), Speed::High, &acm);
        assert!(matches!(res, Err(Error::UnsupportedConfiguration(_))));
        // notification endpoint would be 16
        let res = add_acm(&mut ctx, Cursor::new(0, 15), Speed::High, &acm);
        assert!(matches!(res, Err(Error::UnsupportedConfiguration(_))));
        let ncm = EthernetOptions::ncm("020000000003");
        assert!(add_ncm(&mut ctx, Cursor::new(254, 1), Speed::Full, &ncm).is_err());
        assert!(ctx.is_empty());

        add_acm(&mut ctx, Cursor::new(253, 14), Speed::High, &acm).unwrap();
        let addrs: Vec<u32> = endpoints(&ctx)
            .iter()
            .map(|d| d.get(&endpoint::ENDPOINT_ADDRESS))
            .collect();
        assert_eq!(addrs, [0x8F, 0x8E, 0x0E]);
    }
}
