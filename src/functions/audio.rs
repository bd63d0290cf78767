//! USB audio functions: UAC2 speaker and microphone, UAC3 BADD speaker
use crate::consts::audio::*;
use crate::consts::{ClassCode, ENDPOINT_IN, ENDPOINT_OUT, Speed, SyncType, UsageType};
use crate::context::{Context, DescId};
use crate::descriptor::{
    DescKind, ac_header, as_general, clock_source, feature_unit, format_type_i,
    input_terminal, output_terminal,
};
use crate::error::{Error, Result};
use log::*;
use std::str::FromStr;
use super::{
    Allocation, Cursor, EndpointKind, add_association, add_endpoint, add_interface,
    iso_packet_size,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Audio class revision a function is described with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AudioProtocol {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "UAC2"))]
    Uac2,
    /// Basic audio device profile, no class-specific descriptors
    #[cfg_attr(feature = "serde", serde(rename = "UAC3"))]
    Uac3Badd,
}

impl FromStr for AudioProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("UAC2") {
            Ok(Self::Uac2)
        } else if s.eq_ignore_ascii_case("UAC3") || s.eq_ignore_ascii_case("BADD") {
            Ok(Self::Uac3Badd)
        } else {
            Err(Error::UnsupportedConfiguration(format!(
                "unknown audio protocol {s:?}"
            )))
        }
    }
}

/// Stream format and naming of an audio function
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AudioOptions {
    pub function_name: Option<String>,
    pub protocol: AudioProtocol,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// Asynchronous endpoint with explicit feedback (speaker) or device clock (microphone)
    pub asynchronous: bool,
    pub sample_rate: u32,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            function_name: None,
            protocol: AudioProtocol::Uac2,
            channels: 2,
            bits_per_sample: 16,
            asynchronous: true,
            sample_rate: SAMPLE_RATE_HZ,
        }
    }
}

impl AudioOptions {
    pub fn speaker() -> Self {
        Self {
            function_name: Some("UAC2 Speaker".to_string()),
            ..Default::default()
        }
    }

    pub fn microphone() -> Self {
        Self {
            function_name: Some("UAC2 Microphone".to_string()),
            ..Default::default()
        }
    }

    fn sample_bytes(&self) -> Result<u8> {
        match self.bits_per_sample {
            16 => Ok(2),
            24 => Ok(3),
            32 => Ok(4),
            bits => Err(Error::UnsupportedConfiguration(format!(
                "{bits} bits per sample"
            ))),
        }
    }

    fn sync(&self) -> SyncType {
        if self.asynchronous {
            SyncType::Async
        } else {
            SyncType::Synchronous
        }
    }

    fn channel_config(&self) -> u32 {
        if self.channels >= 32 {
            u32::MAX
        } else {
            (1u32 << self.channels) - 1
        }
    }

    fn check(&self) -> Result<u8> {
        if self.sample_rate != SAMPLE_RATE_HZ {
            return Err(Error::UnsupportedConfiguration(format!(
                "sample rate {} Hz, only {SAMPLE_RATE_HZ} Hz is supported",
                self.sample_rate
            )));
        }
        if self.channels == 0 {
            return Err(Error::UnsupportedConfiguration(
                "audio function without channels".to_string(),
            ));
        }
        if self.channels > MAX_CHANNELS {
            return Err(Error::UnsupportedConfiguration(format!(
                "{} channels, at most {MAX_CHANNELS} are supported",
                self.channels
            )));
        }
        self.sample_bytes()
    }
}

/// Most channels whose feature unit still fits a 1-byte `bLength`
pub const MAX_CHANNELS: u8 = 61;

const CLOCK_ID: u8 = 1;

fn class(subclass: u8, protocol: u8) -> (u8, u8, u8) {
    (ClassCode::Audio as u8, subclass, protocol)
}

fn add_clock_source(ctx: &mut Context, sync: SyncType) -> Result<DescId> {
    let mut attributes = CLOCK_INTERNAL_FIXED;
    if sync == SyncType::Synchronous {
        attributes |= CLOCK_SYNCED_TO_SOF;
    }
    Ok(ctx
        .add(DescKind::ClockSource)?
        .set(&clock_source::CLOCK_ID, CLOCK_ID as u32)?
        .set(&clock_source::ATTRIBUTES, attributes as u32)?
        .set(&clock_source::CONTROLS, CLOCK_CONTROL_FREQ_READ as u32)?
        .id())
}

fn add_input_terminal(
    ctx: &mut Context,
    id: u8,
    typ: u16,
    opts: &AudioOptions,
) -> Result<DescId> {
    Ok(ctx
        .add(DescKind::InputTerminal)?
        .set(&input_terminal::TERMINAL_ID, id as u32)?
        .set(&input_terminal::TERMINAL_TYPE, typ as u32)?
        .set(&input_terminal::CLOCK_SOURCE_ID, CLOCK_ID as u32)?
        .set(&input_terminal::NR_CHANNELS, opts.channels as u32)?
        .set(&input_terminal::CHANNEL_CONFIG, opts.channel_config())?
        .id())
}

fn add_output_terminal(ctx: &mut Context, id: u8, typ: u16, source: u8) -> Result<DescId> {
    Ok(ctx
        .add(DescKind::OutputTerminal)?
        .set(&output_terminal::TERMINAL_ID, id as u32)?
        .set(&output_terminal::TERMINAL_TYPE, typ as u32)?
        .set(&output_terminal::SOURCE_ID, source as u32)?
        .set(&output_terminal::CLOCK_SOURCE_ID, CLOCK_ID as u32)?
        .id())
}

/// Audio control header whose `wTotalLength` covers itself and `units`
fn patch_ac_header(ctx: &mut Context, header: DescId, units: &[DescId]) -> Result<()> {
    let mut total = ctx.get(header)?.len();
    for id in units {
        total += ctx.get(*id)?.len();
    }
    ctx.edit(header)?
        .set(&ac_header::TOTAL_LENGTH, total as u32)?;
    Ok(())
}

/// Zero-bandwidth alternate setting 0, streaming alternate setting 1 with its
/// class-specific general and format descriptors
fn add_streaming_interface(
    ctx: &mut Context,
    number: u8,
    link: u8,
    opts: &AudioOptions,
    sample_bytes: u8,
) -> Result<()> {
    let class = class(SUBCLASS_AUDIO_STREAMING, PROTOCOL_UAC2);
    add_interface(ctx, number, 0, class, None)?;
    add_interface(ctx, number, 1, class, None)?;
    ctx.add(DescKind::AsGeneral)?
        .set(&as_general::TERMINAL_LINK, link as u32)?
        .set(&as_general::NR_CHANNELS, opts.channels as u32)?
        .set(&as_general::CHANNEL_CONFIG, opts.channel_config())?;
    ctx.add(DescKind::FormatTypeI)?
        .set(&format_type_i::SUBSLOT_SIZE, sample_bytes as u32)?
        .set(&format_type_i::BIT_RESOLUTION, opts.bits_per_sample as u32)?;
    Ok(())
}

/// Append an audio output function
///
/// With [AudioProtocol::Uac2] the control interface describes
/// USB streaming -> feature unit (mute, volume) -> speaker. An asynchronous stream adds
/// a feedback endpoint sharing the data endpoint's number.
pub fn add_speaker(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &AudioOptions,
) -> Result<Allocation> {
    let sample_bytes = opts.check()?;
    let used = Allocation::new(2, 1);
    at.reserve(used)?;
    if opts.protocol == AudioProtocol::Uac3Badd {
        return add_badd_speaker(ctx, at, speed, opts, sample_bytes);
    }
    let control = at.interface;
    let streaming = control + 1;
    let name = opts.function_name.as_deref();
    let sync = opts.sync();
    debug!(
        "Adding UAC2 speaker at interface {control}, endpoint {}, {} channels, {} bits",
        at.endpoint, opts.channels, opts.bits_per_sample
    );

    add_association(ctx, control, 2, class(SUBCLASS_UNDEFINED, PROTOCOL_UAC2), name)?;
    add_interface(ctx, control, 0, class(SUBCLASS_AUDIO_CONTROL, PROTOCOL_UAC2), name)?;
    let header = ctx
        .add(DescKind::AcHeader)?
        .set(&ac_header::CATEGORY, CATEGORY_DESKTOP_SPEAKER as u32)?
        .id();
    let clock = add_clock_source(ctx, sync)?;
    let input = add_input_terminal(ctx, 2, TERMINAL_USB_STREAMING, opts)?;
    // master channel only
    let volume = ctx
        .add_feature_unit(opts.channels)?
        .set(&feature_unit::UNIT_ID, 3)?
        .set(&feature_unit::SOURCE_ID, 2)?
        .set_feature_controls(0, FU_CONTROL_MUTE | FU_CONTROL_VOLUME)?
        .id();
    let output = add_output_terminal(ctx, 4, TERMINAL_SPEAKER, 3)?;
    let units = [clock, input, volume, output];
    patch_ac_header(ctx, header, &units)?;

    add_streaming_interface(ctx, streaming, 2, opts, sample_bytes)?;
    let size = iso_packet_size(opts.channels, sample_bytes, sync);
    add_endpoint(
        ctx,
        ENDPOINT_OUT | at.endpoint,
        EndpointKind::iso(sync, UsageType::Data),
        speed,
        Some(size),
    )?;
    ctx.add(DescKind::AsIsoEndpoint)?;
    if opts.asynchronous {
        add_endpoint(
            ctx,
            ENDPOINT_IN | at.endpoint,
            EndpointKind::iso(SyncType::None, UsageType::Feedback),
            speed,
            None,
        )?;
    }
    Ok(used)
}

/// UAC3 basic audio device speaker: standard descriptors only
fn add_badd_speaker(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &AudioOptions,
    sample_bytes: u8,
) -> Result<Allocation> {
    if opts.channels > 2 || opts.bits_per_sample > 24 {
        return Err(Error::UnsupportedConfiguration(format!(
            "BADD speaker with {} channels, {} bits",
            opts.channels, opts.bits_per_sample
        )));
    }
    let control = at.interface;
    let streaming = control + 1;
    let sync = opts.sync();
    debug!("Adding UAC3 BADD speaker at interface {control}, endpoint {}", at.endpoint);

    add_association(
        ctx,
        control,
        2,
        class(FUNCTION_SUBCLASS_BADD_SPEAKER, PROTOCOL_UAC3),
        opts.function_name.as_deref(),
    )?;
    // the optional interrupt endpoint is omitted
    add_interface(ctx, control, 0, class(SUBCLASS_AUDIO_CONTROL, PROTOCOL_UAC3), None)?;
    let streaming_class = class(SUBCLASS_AUDIO_STREAMING, PROTOCOL_UAC3);
    add_interface(ctx, streaming, 0, streaming_class, None)?;
    add_interface(ctx, streaming, 1, streaming_class, None)?;
    add_endpoint(
        ctx,
        ENDPOINT_OUT | at.endpoint,
        EndpointKind::iso(sync, UsageType::Data),
        speed,
        Some(iso_packet_size(opts.channels, sample_bytes, sync)),
    )?;
    if opts.asynchronous {
        add_endpoint(
            ctx,
            ENDPOINT_IN | at.endpoint,
            EndpointKind::iso(SyncType::None, UsageType::Feedback),
            speed,
            None,
        )?;
    }
    Ok(Allocation::new(2, 1))
}

/// Append a UAC2 audio input function: microphone -> USB streaming
pub fn add_microphone(
    ctx: &mut Context,
    at: Cursor,
    speed: Speed,
    opts: &AudioOptions,
) -> Result<Allocation> {
    if opts.protocol != AudioProtocol::Uac2 {
        return Err(Error::UnsupportedConfiguration(
            "microphone is only available as UAC2".to_string(),
        ));
    }
    let sample_bytes = opts.check()?;
    let used = Allocation::new(2, 1);
    at.reserve(used)?;
    let control = at.interface;
    let streaming = control + 1;
    let name = opts.function_name.as_deref();
    let sync = opts.sync();
    debug!(
        "Adding UAC2 microphone at interface {control}, endpoint {}, {} channels, {} bits",
        at.endpoint, opts.channels, opts.bits_per_sample
    );

    add_association(ctx, control, 2, class(SUBCLASS_UNDEFINED, PROTOCOL_UAC2), name)?;
    add_interface(ctx, control, 0, class(SUBCLASS_AUDIO_CONTROL, PROTOCOL_UAC2), name)?;
    let header = ctx
        .add(DescKind::AcHeader)?
        .set(&ac_header::CATEGORY, CATEGORY_MICROPHONE as u32)?
        .id();
    let clock = add_clock_source(ctx, sync)?;
    let input = add_input_terminal(ctx, 2, TERMINAL_MICROPHONE, opts)?;
    let output = add_output_terminal(ctx, 3, TERMINAL_USB_STREAMING, 2)?;
    let units = [clock, input, output];
    patch_ac_header(ctx, header, &units)?;

    add_streaming_interface(ctx, streaming, 3, opts, sample_bytes)?;
    add_endpoint(
        ctx,
        ENDPOINT_IN | at.endpoint,
        EndpointKind::iso(sync, UsageType::Data),
        speed,
        Some(iso_packet_size(opts.channels, sample_bytes, sync)),
    )?;
    ctx.add(DescKind::AsIsoEndpoint)?;
    Ok(used)
}
