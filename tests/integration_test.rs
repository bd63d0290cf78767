mod common;
use common::*;
use usb2desc::functions::audio::{self, AudioOptions, AudioProtocol};
use usb2desc::functions::cdc::{self, AcmOptions, EthernetOptions};
use usb2desc::*;

/// Descriptor types that never belong to a configuration block
const OUTSIDE_CONFIGURATION: &[u8] = &[0x01, 0x02, 0x03, 0x06, 0x07, 0xFF];

fn single_speed_device(speed: Speed) -> (Context, Allocation) {
    let mut ctx = Context::new();
    ctx.add_device().unwrap().set_iad_multifunction().unwrap();
    ctx.add_configuration().unwrap();
    let used = cdc::add_acm(&mut ctx, Cursor::new(0, 1), speed, &AcmOptions::default()).unwrap();
    (ctx, used)
}

fn everything() -> DeviceConfig {
    DeviceConfig {
        manufacturer: Some("Acme".to_string()),
        product: Some("Widget".to_string()),
        serial_number: Some("0001".to_string()),
        speaker: Some(AudioOptions::speaker()),
        microphone: Some(AudioOptions::microphone()),
        ecm: Some(EthernetOptions::ecm("02A0B1C2D3E4")),
        ncm: Some(EthernetOptions::ncm("02A0B1C2D3E5")),
        ..Default::default()
    }
}

/// `(configuration descriptor, descriptors of its block)` for every configuration
fn configuration_blocks(table: &[u8]) -> Vec<(&[u8], Vec<(u8, &[u8])>)> {
    let mut blocks: Vec<(&[u8], Vec<(u8, &[u8])>)> = vec![];
    let mut open = false;
    for (typ, desc) in walk(table) {
        if typ == 0x02 {
            blocks.push((desc, vec![]));
            open = true;
        } else if OUTSIDE_CONFIGURATION.contains(&typ) {
            open = false;
        } else if open {
            if let Some(block) = blocks.last_mut() {
                block.1.push((typ, desc));
            }
        }
    }
    blocks
}

#[test]
fn acm_at_interface_zero() {
    setup_test_logger();
    let (mut ctx, used) = single_speed_device(Speed::High);
    assert_eq!(used, Allocation::new(2, 2));
    ctx.finalize().unwrap();
    let cfg = ctx.get(ctx.find_nth_of_type(0x02, 0).unwrap()).unwrap();
    assert_eq!(cfg.get(&configuration::NUM_INTERFACES), 2);
    assert_eq!(cfg.get(&configuration::CONFIGURATION_VALUE), 1);
    assert_eq!(cfg.bytes()[7] & 0x80, 0x80);
}

#[test]
fn total_length_covers_block() {
    setup_test_logger();
    for speeds in [SpeedSelection::High, SpeedSelection::Dual] {
        let ctx = DeviceConfig {
            speeds,
            ..everything()
        }
        .build()
        .unwrap();
        let bytes = ctx.to_bytes().unwrap();
        let blocks = configuration_blocks(&bytes);
        assert_eq!(blocks.len(), speeds.speeds().len());
        for (cfg, descs) in blocks {
            let total: usize = cfg.len() + descs.iter().map(|(_, d)| d.len()).sum::<usize>();
            assert_eq!(le16(cfg, 2) as usize, total);
            // ACM, speaker, microphone, ECM, NCM
            assert_eq!(cfg[4], 10);
        }
    }
}

#[test]
fn endpoint_counts_per_interface() {
    setup_test_logger();
    let ctx = DeviceConfig {
        speeds: SpeedSelection::Full,
        ..everything()
    }
    .build()
    .unwrap();
    let bytes = ctx.to_bytes().unwrap();
    let (_, descs) = configuration_blocks(&bytes).remove(0);
    let mut checked = 0;
    for (i, (typ, desc)) in descs.iter().enumerate() {
        if *typ != 0x04 {
            continue;
        }
        let endpoints = descs[i + 1..]
            .iter()
            .take_while(|(t, _)| *t != 0x04)
            .filter(|(t, _)| *t == 0x05)
            .count();
        assert_eq!(desc[4] as usize, endpoints, "interface {} alt {}", desc[2], desc[3]);
        checked += 1;
    }
    // NCM and ECM data and both audio streaming interfaces carry two settings
    assert_eq!(checked, 14);
}

#[test]
fn interface_and_endpoint_numbering() {
    let mut ctx = Context::new();
    ctx.add_device().unwrap();
    ctx.add_configuration().unwrap();
    let mut at = Cursor::default();
    let ncm = EthernetOptions::ncm("02A0B1C2D3E4");
    let used = cdc::add_acm(&mut ctx, at, Speed::High, &AcmOptions::default()).unwrap();
    at.advance(used).unwrap();
    let used = audio::add_speaker(&mut ctx, at, Speed::High, &AudioOptions::speaker()).unwrap();
    at.advance(used).unwrap();
    let used = cdc::add_ncm(&mut ctx, at, Speed::High, &ncm).unwrap();
    at.advance(used).unwrap();
    assert_eq!(at, Cursor::new(6, 6));

    let mut addresses = vec![];
    for (_, d) in ctx.iter() {
        if d.kind() == DescKind::Endpoint {
            let addr = d.get(&endpoint::ENDPOINT_ADDRESS);
            // the feedback endpoint pairs with the audio data endpoint
            if d.get(&endpoint::ATTRIBUTES) & 0x30 != 0x10 {
                assert!(!addresses.contains(&addr), "endpoint {addr:#04x} used twice");
            }
            addresses.push(addr);
        }
    }
    assert_eq!(addresses, [0x82, 0x81, 0x01, 0x03, 0x83, 0x85, 0x84, 0x04]);
}

#[test]
fn dual_speed_qualifiers() {
    setup_test_logger();
    let ctx = DeviceConfig::default().build().unwrap();
    let bytes = ctx.to_bytes().unwrap();
    let descs = walk(&bytes);
    let devices: Vec<_> = descs.iter().filter(|(t, _)| *t == 0x01).collect();
    let qualifiers: Vec<_> = descs.iter().filter(|(t, _)| *t == 0x06).collect();
    assert_eq!(devices.len(), 2);
    assert_eq!(qualifiers.len(), 2);
    for (_, q) in &qualifiers {
        assert_eq!(q.len(), 10);
        assert_eq!(le16(q, 2), 0x0200);
        assert_eq!(q[4..9], [0xEF, 0x02, 0x01, 64, 1]);
    }
    for (_, d) in &devices {
        assert_eq!(d[17], 1);
    }
    for (cfg, _) in configuration_blocks(&bytes) {
        assert_eq!(cfg[5], 1);
    }
    // the two speed sections are separated by a sentinel
    let first_sentinel = descs.iter().position(|(t, _)| *t == 0xFF).unwrap();
    assert_eq!(descs[first_sentinel + 1].0, 0x01);
}

#[test]
fn qualifiers_describe_the_other_speed() {
    setup_test_logger();
    let mut ctx = Context::new();
    ctx.add_device().unwrap().set_iad_multifunction().unwrap();
    ctx.add_configuration().unwrap();
    cdc::add_acm(&mut ctx, Cursor::default(), Speed::Full, &AcmOptions::default()).unwrap();
    ctx.add_sentinel().unwrap();
    ctx.add_device()
        .unwrap()
        .set(&device::DEVICE_CLASS, 0x02)
        .unwrap()
        .set(&device::MAX_PACKET_SIZE_0, 32)
        .unwrap();
    ctx.add_configuration().unwrap();
    cdc::add_acm(&mut ctx, Cursor::default(), Speed::High, &AcmOptions::default()).unwrap();
    ctx.finalize().unwrap();

    let bytes = ctx.to_bytes().unwrap();
    let descs = walk(&bytes);
    let qualifiers: Vec<_> = descs.iter().filter(|(t, _)| *t == 0x06).collect();
    assert_eq!(qualifiers.len(), 2);
    // full speed section first: its qualifier reports the high speed device
    assert_eq!(qualifiers[0].1[4..9], [0x02, 0x00, 0x00, 32, 1]);
    assert_eq!(qualifiers[1].1[4..9], [0xEF, 0x02, 0x01, 64, 1]);
}

#[test]
fn other_speed_view() {
    let ctx = DeviceConfig::default().build().unwrap();
    let bytes = ctx.to_bytes().unwrap();
    let (cfg, descs) = configuration_blocks(&bytes).remove(0);
    let view = ctx.other_speed_configuration(0).unwrap();
    assert_eq!(view[1], 0x07);
    assert_eq!(view[2..], cfg[2..]);
    assert_eq!(view.len(), le16(cfg, 2) as usize);
    assert_eq!(view.len(), cfg.len() + descs.iter().map(|(_, d)| d.len()).sum::<usize>());
    assert!(ctx.other_speed_configuration(2).is_err());
}

#[test]
fn strings_appended_after_functions() {
    let ctx = DeviceConfig {
        speeds: SpeedSelection::High,
        ..everything()
    }
    .build()
    .unwrap();
    let bytes = ctx.to_bytes().unwrap();
    let descs = walk(&bytes);
    let first_string = descs.iter().position(|(t, _)| *t == 0x03).unwrap();
    assert_eq!(descs[first_string].1, [4, 3, 0x09, 0x04]);
    let strings = descs[first_string + 1..]
        .iter()
        .take_while(|(t, _)| *t == 0x03)
        .count();
    assert_eq!(strings, ctx.strings().len());
    assert_eq!(descs.last().unwrap().1, [2, 0xFF]);

    let dev = ctx.find_nth_of_type(0x01, 0).unwrap();
    assert_eq!(ctx.get_string(dev, &device::MANUFACTURER).unwrap(), Some("Acme"));
    let iproduct = ctx.get(dev).unwrap().get(&device::PRODUCT) as usize;
    let text = ctx
        .get(ctx.find_nth_of_type(0x03, iproduct).unwrap())
        .unwrap()
        .text();
    assert_eq!(text.as_deref(), Some("Widget"));
}

#[test]
fn locked_after_finalize() {
    let (mut ctx, _) = single_speed_device(Speed::Full);
    ctx.finalize().unwrap();
    assert!(matches!(ctx.finalize(), Err(Error::AlreadyFinalized)));
    assert!(matches!(ctx.add_interface(), Err(Error::LockedState)));
    assert!(matches!(
        cdc::add_acm(&mut ctx, Cursor::new(2, 3), Speed::Full, &AcmOptions::default()),
        Err(Error::LockedState)
    ));
}

#[test]
fn unsupported_audio_requests() {
    assert!(matches!(
        "UAC1".parse::<AudioProtocol>(),
        Err(Error::UnsupportedConfiguration(_))
    ));
    let config = DeviceConfig {
        microphone: Some(AudioOptions {
            protocol: AudioProtocol::Uac3Badd,
            ..AudioOptions::microphone()
        }),
        ..Default::default()
    };
    assert!(matches!(
        config.build(),
        Err(Error::UnsupportedConfiguration(_))
    ));
}

#[test]
fn labelled_table() {
    let (mut ctx, _) = single_speed_device(Speed::High);
    assert!(matches!(ctx.table(), Err(Error::NotFinalized)));
    ctx.finalize().unwrap();
    let table = ctx.table().unwrap();
    assert_eq!(table.len(), ctx.to_bytes().unwrap().len());
    assert_eq!(table[2].record, "DeviceDesc");
    assert_eq!(table[2].field, Some("bcdUSB"));
    assert_eq!(table[18].record, "ConfigurationDesc");
    assert!(table[18].starts_record);

    let mut listing = vec![];
    ctx.write_table(&mut listing).unwrap();
    let listing = String::from_utf8(listing).unwrap();
    assert!(listing.starts_with("-- DeviceDesc\n   0 => 0x12  bLength\n"));
    assert!(listing.contains("-- CDCFuncUnionDesc"));
}

#[test]
fn split_matches_walk() {
    let ctx = DeviceConfig::default().build().unwrap();
    let bytes = ctx.to_bytes().unwrap();
    let split = split_descriptors(&bytes).unwrap();
    assert_eq!(split.len(), walk(&bytes).len());
    assert_eq!(split[0].0, Some(DescriptorType::Device));
    assert_eq!(split.last().unwrap().0, Some(DescriptorType::Sentinel));

    let mut broken = bytes.clone();
    broken[0] = 0;
    assert!(matches!(split_descriptors(&broken), Err(Error::InvalidLayout(_))));
    assert!(split_descriptors(&bytes[..bytes.len() - 1]).is_err());
}
