//! Device description driving the composers.
use crate::consts::{ConfigAttributes, Speed};
use crate::context::Context;
use crate::descriptor::{configuration, device};
use crate::error::{Error, Result};
use crate::functions::audio::{self, AudioOptions};
use crate::functions::cdc::{self, AcmOptions, EthernetOptions};
use crate::functions::Cursor;
use log::*;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Speeds a device table is built for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SpeedSelection {
    Full,
    High,
    /// Full and high speed sections with device qualifiers
    #[default]
    Dual,
}

impl SpeedSelection {
    pub fn speeds(self) -> &'static [Speed] {
        match self {
            SpeedSelection::Full => &[Speed::Full],
            SpeedSelection::High => &[Speed::High],
            SpeedSelection::Dual => &[Speed::Full, Speed::High],
        }
    }
}

impl FromStr for SpeedSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "high" => Ok(Self::High),
            "dual" => Ok(Self::Dual),
            _ => Err(Error::UnsupportedConfiguration(format!("unknown speed {s:?}"))),
        }
    }
}

/// A single-configuration composite device
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub speeds: SpeedSelection,
    pub remote_wakeup: bool,
    /// In units of 2 mA
    pub max_power: u8,
    pub configuration_name: Option<String>,
    pub first_interface: u8,
    pub first_endpoint: u8,
    pub acm: Option<AcmOptions>,
    pub speaker: Option<AudioOptions>,
    pub microphone: Option<AudioOptions>,
    pub ecm: Option<EthernetOptions>,
    pub ncm: Option<EthernetOptions>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // pid.codes open-source vendor id
            vendor_id: 0x1209,
            product_id: 0x0001,
            bcd_device: 0x0100,
            manufacturer: None,
            product: None,
            serial_number: None,
            speeds: SpeedSelection::Dual,
            remote_wakeup: true,
            max_power: 0x32,
            configuration_name: None,
            first_interface: 0,
            first_endpoint: 1,
            acm: Some(AcmOptions::default()),
            speaker: None,
            microphone: None,
            ecm: None,
            ncm: None,
        }
    }
}

impl DeviceConfig {
    /// Run the enabled composers once per speed and finalize the result
    pub fn build(&self) -> Result<Context> {
        let mut ctx = Context::new();
        let dev = ctx
            .add_device()?
            .set(&device::ID_VENDOR, self.vendor_id as u32)?
            .set(&device::ID_PRODUCT, self.product_id as u32)?
            .set(&device::BCD_DEVICE, self.bcd_device as u32)?
            .set_opt_string(&device::MANUFACTURER, self.manufacturer.as_deref())?
            .set_opt_string(&device::PRODUCT, self.product.as_deref())?
            .set_opt_string(&device::SERIAL_NUMBER, self.serial_number.as_deref())?
            .set_iad_multifunction()?
            .id();
        let mut attributes = ConfigAttributes::empty();
        if self.remote_wakeup {
            attributes |= ConfigAttributes::REMOTE_WAKEUP;
        }
        let cfg = ctx
            .add_configuration()?
            .set(&configuration::MAX_POWER, self.max_power as u32)?
            .set_attributes(attributes)?
            .set_opt_string(&configuration::CONFIGURATION, self.configuration_name.as_deref())?
            .id();

        let speeds = self.speeds.speeds();
        for (i, speed) in speeds.iter().enumerate() {
            debug!("Composing {speed:?} speed functions");
            self.compose(&mut ctx, *speed)?;
            if i + 1 < speeds.len() {
                ctx.add_sentinel()?;
                ctx.duplicate(dev)?;
                ctx.duplicate(cfg)?;
            }
        }
        ctx.finalize()?;
        Ok(ctx)
    }

    fn compose(&self, ctx: &mut Context, speed: Speed) -> Result<()> {
        let mut at = Cursor::new(self.first_interface, self.first_endpoint);
        if let Some(opts) = &self.acm {
            at.advance(cdc::add_acm(ctx, at, speed, opts)?)?;
        }
        if let Some(opts) = &self.speaker {
            at.advance(audio::add_speaker(ctx, at, speed, opts)?)?;
        }
        if let Some(opts) = &self.microphone {
            at.advance(audio::add_microphone(ctx, at, speed, opts)?)?;
        }
        if let Some(opts) = &self.ecm {
            at.advance(cdc::add_ecm(ctx, at, speed, opts)?)?;
        }
        if let Some(opts) = &self.ncm {
            at.advance(cdc::add_ncm(ctx, at, speed, opts)?)?;
        }
        debug!("{speed:?} speed functions end at {at:?}");
        Ok(())
    }
}
