//! Finalization ("wrap-up") of a descriptor context.
//!
//! A single scan over the finished sequence fills in
//! - `bNumEndpoints` of every interface descriptor
//! - `wTotalLength`, `bNumInterfaces` and `bConfigurationValue` of every configuration
//! - `bNumConfigurations` of every device descriptor
//!
//! Afterwards device qualifiers (dual-speed tables), the string descriptors
//! and the terminating sentinel are appended and the context is locked.

use crate::context::{Context, ends_configuration};
use crate::descriptor::{DescKind, Descriptor, configuration, device, device_qualifier, interface};
use crate::error::{Error, Result};
use crate::record::Field;
use log::*;

struct Fixup {
    index: usize,
    field: &'static Field,
    value: u32,
}

struct ConfigTally {
    index: usize,
    value: u32,
    total: u32,
    interfaces: u32,
}

#[derive(Default)]
struct Scan {
    fixups: Vec<Fixup>,
    devices: Vec<usize>,
}

impl Scan {
    fn run(descs: &[Descriptor]) -> Result<Self> {
        let mut scan = Scan::default();
        let mut device: Option<(usize, u32)> = None;
        let mut config: Option<ConfigTally> = None;
        let mut iface: Option<(usize, u32)> = None;

        for (i, d) in descs.iter().enumerate() {
            let kind = d.kind();
            if kind == DescKind::Interface || ends_configuration(kind) {
                scan.flush_interface(iface.take());
            }
            if ends_configuration(kind) {
                scan.flush_configuration(config.take())?;
            }
            match kind {
                DescKind::Device => {
                    scan.flush_device(device.take());
                    scan.devices.push(i);
                    device = Some((i, 0));
                }
                DescKind::Configuration | DescKind::OtherSpeedConfiguration => {
                    let value = match device.as_mut() {
                        Some((_, n)) => {
                            *n += 1;
                            *n
                        }
                        None => 1,
                    };
                    config = Some(ConfigTally {
                        index: i,
                        value,
                        total: 0,
                        interfaces: 0,
                    });
                }
                DescKind::Interface => {
                    // alternate settings share the interface number of setting 0
                    if d.get(&interface::ALTERNATE_SETTING) == 0 {
                        if let Some(c) = config.as_mut() {
                            c.interfaces += 1;
                        }
                    }
                    iface = Some((i, 0));
                }
                DescKind::Endpoint => match iface.as_mut() {
                    Some((_, n)) => *n += 1,
                    None => warn!("Endpoint descriptor #{i} is not part of any interface"),
                },
                _ => {}
            }
            if kind != DescKind::Sentinel {
                if let Some(c) = config.as_mut() {
                    c.total += d.len() as u32;
                }
            }
        }
        scan.flush_interface(iface.take());
        scan.flush_configuration(config.take())?;
        scan.flush_device(device.take());

        if scan.devices.len() > 2 {
            return Err(Error::UnsupportedConfiguration(format!(
                "{} device descriptors; at most one per speed (full, high) is supported",
                scan.devices.len()
            )));
        }
        Ok(scan)
    }

    fn fixup(&mut self, index: usize, field: &'static Field, value: u32) {
        self.fixups.push(Fixup {
            index,
            field,
            value,
        });
    }

    fn flush_interface(&mut self, iface: Option<(usize, u32)>) {
        if let Some((index, endpoints)) = iface {
            self.fixup(index, &interface::NUM_ENDPOINTS, endpoints);
        }
    }

    fn flush_configuration(&mut self, config: Option<ConfigTally>) -> Result<()> {
        let Some(c) = config else {
            return Ok(());
        };
        if c.total > u16::MAX as u32 {
            return Err(Error::InvalidLayout(format!(
                "configuration {} is {} bytes long",
                c.value, c.total
            )));
        }
        info!(
            "Configuration {} total length {}, num interfaces {}",
            c.value, c.total, c.interfaces
        );
        self.fixup(c.index, &configuration::TOTAL_LENGTH, c.total);
        self.fixup(c.index, &configuration::NUM_INTERFACES, c.interfaces);
        self.fixup(c.index, &configuration::CONFIGURATION_VALUE, c.value);
        Ok(())
    }

    fn flush_device(&mut self, device: Option<(usize, u32)>) {
        if let Some((index, configs)) = device {
            self.fixup(index, &device::NUM_CONFIGURATIONS, configs);
        }
    }
}

/// Qualifier telling a host what `other` looks like at the other speed
fn qualifier_for(other: &Descriptor) -> Descriptor {
    let mut q = Descriptor::new(DescKind::DeviceQualifier);
    let copied = [
        (&device_qualifier::DEVICE_CLASS, &device::DEVICE_CLASS),
        (&device_qualifier::DEVICE_SUBCLASS, &device::DEVICE_SUBCLASS),
        (&device_qualifier::DEVICE_PROTOCOL, &device::DEVICE_PROTOCOL),
        (&device_qualifier::MAX_PACKET_SIZE_0, &device::MAX_PACKET_SIZE_0),
        (&device_qualifier::NUM_CONFIGURATIONS, &device::NUM_CONFIGURATIONS),
    ];
    for (to, from) in copied {
        q.put_resolved(to, other.get(from));
    }
    q
}

impl Context {
    /// Resolve derived fields and lock the context
    ///
    /// Nothing is modified unless every check passes.
    pub fn finalize(&mut self) -> Result<()> {
        if self.is_finalized() {
            return Err(Error::AlreadyFinalized);
        }
        let scan = Scan::run(self.descriptors())?;
        let strings = self
            .strings()
            .iter()
            .map(|s| Descriptor::string(s))
            .collect::<Result<Vec<_>>>()?;

        let descs = self.descriptors_mut();
        for f in &scan.fixups {
            trace!(
                "{} #{}: {} = {}",
                descs[f.index].kind().name(),
                f.index,
                f.field.name,
                f.value
            );
            descs[f.index].put_resolved(f.field, f.value);
        }

        if let [full, high] = scan.devices[..] {
            let for_full = qualifier_for(&self.descriptors()[high]);
            let for_high = qualifier_for(&self.descriptors()[full]);
            debug!("Adding device qualifiers for a dual-speed table");
            self.push_resolved(for_full);
            self.push_resolved(for_high);
        }

        if !strings.is_empty() {
            // language table at string index 0
            self.push_resolved(Descriptor::new(DescKind::StringLanguages));
            for s in strings {
                self.push_resolved(s);
            }
        }
        self.push_resolved(Descriptor::new(DescKind::Sentinel));
        self.set_finalized();
        debug!(
            "Finalized {} descriptors, {} strings",
            self.len(),
            self.strings().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::endpoint;
    use crate::util::tests::setup_test_logger;

    fn tiny() -> Context {
        let mut ctx = Context::new();
        ctx.add_device().unwrap();
        ctx.add_configuration().unwrap();
        ctx.add_interface().unwrap();
        ctx.add_endpoint().unwrap();
        ctx.add_endpoint().unwrap();
        ctx
    }

    #[test]
    fn counts_and_lengths() {
        setup_test_logger();
        let mut ctx = tiny();
        ctx.finalize().unwrap();
        let cfg = ctx.get(ctx.find_nth_of_type(0x02, 0).unwrap()).unwrap();
        assert_eq!(cfg.get(&configuration::TOTAL_LENGTH), 9 + 9 + 7 + 7);
        assert_eq!(cfg.get(&configuration::NUM_INTERFACES), 1);
        assert_eq!(cfg.get(&configuration::CONFIGURATION_VALUE), 1);
        let ifc = ctx.get(ctx.find_nth_of_type(0x04, 0).unwrap()).unwrap();
        assert_eq!(ifc.get(&interface::NUM_ENDPOINTS), 2);
        let dev = ctx.get(ctx.find_nth_of_type(0x01, 0).unwrap()).unwrap();
        assert_eq!(dev.get(&device::NUM_CONFIGURATIONS), 1);
    }

    #[test]
    fn no_strings_means_no_language_table() {
        let mut ctx = tiny();
        ctx.finalize().unwrap();
        assert!(ctx.find_nth_of_type(0x03, 0).is_err());
        let last = ctx.iter().last().unwrap().1;
        assert_eq!(last.bytes(), &[2, 0xFF]);
    }

    #[test]
    fn strings_follow_language_table() {
        let mut ctx = tiny();
        ctx.edit(ctx.find_nth_of_type(0x01, 0).unwrap())
            .unwrap()
            .set_string(&device::PRODUCT, "P")
            .unwrap();
        ctx.finalize().unwrap();
        let langs = ctx.get(ctx.find_nth_of_type(0x03, 0).unwrap()).unwrap();
        assert_eq!(langs.bytes(), &[4, 3, 0x09, 0x04]);
        let p = ctx.get(ctx.find_nth_of_type(0x03, 1).unwrap()).unwrap();
        assert_eq!(p.text().as_deref(), Some("P"));
    }

    #[test]
    fn locked_after_finalize() {
        let mut ctx = tiny();
        ctx.finalize().unwrap();
        assert!(matches!(ctx.finalize(), Err(Error::AlreadyFinalized)));
        assert!(matches!(ctx.add_endpoint(), Err(Error::LockedState)));
        assert!(matches!(ctx.add_string("late"), Err(Error::LockedState)));
        let id = ctx.find_nth_of_type(0x05, 0).unwrap();
        assert!(matches!(ctx.edit(id), Err(Error::LockedState)));
        assert_eq!(ctx.get(id).unwrap().get(&endpoint::MAX_PACKET_SIZE), 0);
    }

    #[test]
    fn sentinel_is_not_counted() {
        let mut ctx = tiny();
        ctx.add_sentinel().unwrap();
        ctx.finalize().unwrap();
        let cfg = ctx.get(ctx.find_nth_of_type(0x02, 0).unwrap()).unwrap();
        assert_eq!(cfg.get(&configuration::TOTAL_LENGTH), 32);
    }

    #[test]
    fn overlong_string_rejected_without_changes() {
        let mut ctx = tiny();
        let long = "x".repeat(127);
        ctx.add_string(&long).unwrap();
        let before = ctx.len();
        assert!(matches!(ctx.finalize(), Err(Error::InvalidLayout(_))));
        assert!(!ctx.is_finalized());
        assert_eq!(ctx.len(), before);
        let cfg = ctx.get(ctx.find_nth_of_type(0x02, 0).unwrap()).unwrap();
        assert_eq!(cfg.get(&configuration::TOTAL_LENGTH), 0);
    }

    #[test]
    fn three_devices_are_unsupported() {
        let mut ctx = Context::new();
        for _ in 0..3 {
            ctx.add_device().unwrap();
        }
        assert!(matches!(
            ctx.finalize(),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }
}
