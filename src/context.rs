//! Ordered descriptor sequence with its string pool.
//!
//! Descriptors end up in the emitted table in the order they were added. Once
//! [Context::finalize] ran, the context only hands out shared references.

use crate::consts::{ClassCode, ConfigAttributes};
use crate::descriptor::{DescKind, Descriptor, configuration, device};
use crate::error::{Error, Result};
use crate::record::{Encoding, Field};
use crate::strings::StringPool;
use crate::table::{self, TableEntry};
use std::io::Write;

/// Handle of a descriptor inside its [Context]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescId(usize);

impl DescId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Context {
    descs: Vec<Descriptor>,
    strings: StringPool,
    finalized: bool,
}

/// Write access to one descriptor of an unfinalized [Context]
#[derive(Debug)]
pub struct DescMut<'a> {
    id: DescId,
    desc: &'a mut Descriptor,
    strings: &'a mut StringPool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub(crate) fn check_unlocked(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::LockedState);
        }
        Ok(())
    }

    /// Append `desc` at the end of the sequence
    pub fn append(&mut self, desc: Descriptor) -> Result<DescMut<'_>> {
        self.check_unlocked()?;
        self.descs.push(desc);
        let id = DescId(self.descs.len() - 1);
        self.edit(id)
    }

    /// Append a fresh descriptor of `kind` with default field values
    pub fn add(&mut self, kind: DescKind) -> Result<DescMut<'_>> {
        self.append(Descriptor::new(kind))
    }

    pub fn add_device(&mut self) -> Result<DescMut<'_>> {
        self.add(DescKind::Device)
    }

    pub fn add_configuration(&mut self) -> Result<DescMut<'_>> {
        self.add(DescKind::Configuration)
    }

    pub fn add_interface_association(&mut self) -> Result<DescMut<'_>> {
        self.add(DescKind::InterfaceAssociation)
    }

    pub fn add_interface(&mut self) -> Result<DescMut<'_>> {
        self.add(DescKind::Interface)
    }

    pub fn add_endpoint(&mut self) -> Result<DescMut<'_>> {
        self.add(DescKind::Endpoint)
    }

    pub fn add_union(&mut self, subordinates: usize) -> Result<DescMut<'_>> {
        self.append(Descriptor::union(subordinates)?)
    }

    pub fn add_feature_unit(&mut self, channels: u8) -> Result<DescMut<'_>> {
        self.append(Descriptor::feature_unit(channels)?)
    }

    /// Table boundary marker; excluded from configuration lengths
    pub fn add_sentinel(&mut self) -> Result<DescId> {
        Ok(self.add(DescKind::Sentinel)?.id())
    }

    /// Append a copy of `id`, e.g. to start the descriptors of another speed
    pub fn duplicate(&mut self, id: DescId) -> Result<DescId> {
        let copy = self.get(id)?.duplicate();
        Ok(self.append(copy)?.id())
    }

    pub fn get(&self, id: DescId) -> Result<&Descriptor> {
        self.descs
            .get(id.0)
            .ok_or_else(|| Error::NotFound(format!("descriptor #{}", id.0)))
    }

    pub fn edit(&mut self, id: DescId) -> Result<DescMut<'_>> {
        self.check_unlocked()?;
        let desc = self
            .descs
            .get_mut(id.0)
            .ok_or_else(|| Error::NotFound(format!("descriptor #{}", id.0)))?;
        Ok(DescMut {
            id,
            desc,
            strings: &mut self.strings,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (DescId, &Descriptor)> {
        self.descs.iter().enumerate().map(|(i, d)| (DescId(i), d))
    }

    pub(crate) fn descriptors(&self) -> &[Descriptor] {
        &self.descs
    }

    pub(crate) fn descriptors_mut(&mut self) -> &mut [Descriptor] {
        &mut self.descs
    }

    pub(crate) fn push_resolved(&mut self, desc: Descriptor) {
        self.descs.push(desc);
    }

    /// Find the `n`-th (zero-based) descriptor whose type byte is `typ`
    pub fn find_nth_of_type(&self, typ: u8, n: usize) -> Result<DescId> {
        self.iter()
            .filter(|(_, d)| d.descriptor_type() == typ)
            .nth(n)
            .map(|(id, _)| id)
            .ok_or_else(|| Error::NotFound(format!("descriptor #{n} of type {typ:#04x}")))
    }

    pub fn add_string(&mut self, s: &str) -> Result<usize> {
        self.check_unlocked()?;
        self.strings.add(s)
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index)
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub(crate) fn set_finalized(&mut self) {
        self.strings.lock();
        self.finalized = true;
    }

    /// Resolve the string referenced by a string-valued field of `id`
    pub fn get_string(&self, id: DescId, field: &Field) -> Result<Option<&str>> {
        let desc = self.get(id)?;
        if field.encoding != Encoding::StringIndex {
            return Err(Error::NotFound(format!("string field {}", field.name)));
        }
        Ok(self.strings.get(desc.get(field) as usize))
    }

    fn check_finalized(&self) -> Result<()> {
        if !self.finalized {
            return Err(Error::NotFinalized);
        }
        Ok(())
    }

    /// Byte image of the whole table
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_finalized()?;
        Ok(self.descs.iter().flat_map(|d| d.bytes().iter().copied()).collect())
    }

    /// Byte image with every byte labelled by its descriptor and field
    pub fn table(&self) -> Result<Vec<TableEntry>> {
        self.check_finalized()?;
        Ok(table::label(
            self.descs
                .iter()
                .map(|d| (d.kind().name(), d.kind().fields(), d.bytes())),
        ))
    }

    pub fn write_table<W: Write>(&self, w: &mut W) -> Result<()> {
        table::write(&self.table()?, w)
    }

    /// Copy of the `n`-th configuration block, retagged as other-speed configuration
    ///
    /// The block runs up to the next descriptor that is not part of a configuration.
    pub fn other_speed_configuration(&self, n: usize) -> Result<Vec<u8>> {
        self.check_finalized()?;
        let start = self
            .find_nth_of_type(DescKind::Configuration.descriptor_type() as u8, n)?
            .0;
        let mut head = self.descs[start].clone();
        head.retag(DescKind::OtherSpeedConfiguration)?;
        let mut out = head.bytes().to_vec();
        for d in &self.descs[start + 1..] {
            if ends_configuration(d.kind()) {
                break;
            }
            out.extend_from_slice(d.bytes());
        }
        Ok(out)
    }
}

/// Descriptor kinds that close a configuration block
pub(crate) fn ends_configuration(kind: DescKind) -> bool {
    matches!(
        kind,
        DescKind::Configuration
            | DescKind::OtherSpeedConfiguration
            | DescKind::Device
            | DescKind::DeviceQualifier
            | DescKind::StringLanguages
            | DescKind::String
            | DescKind::Sentinel
    )
}

impl<'a> DescMut<'a> {
    pub fn id(&self) -> DescId {
        self.id
    }

    pub fn descriptor(&self) -> &Descriptor {
        &*self.desc
    }

    pub fn get(&self, field: &Field) -> u32 {
        self.desc.get(field)
    }

    /// Write an integer field of this kind; header fields are rejected
    pub fn set(&mut self, field: &Field, value: u32) -> Result<&mut Self> {
        self.desc.put(field, value)?;
        Ok(self)
    }

    /// Write a field looked up by its USB name
    pub fn set_field(&mut self, name: &str, value: u32) -> Result<&mut Self> {
        let field = self.desc.field(name)?;
        self.desc.put(field, value)?;
        Ok(self)
    }

    /// Store `s` in the string pool and reference it from `field`
    pub fn set_string(&mut self, field: &Field, s: &str) -> Result<&mut Self> {
        if field.encoding != Encoding::StringIndex {
            return Err(Error::NotFound(format!("string field {}", field.name)));
        }
        self.desc.check_writable(field)?;
        let index = self.strings.add(s)?;
        self.desc.put(field, index as u32)?;
        Ok(self)
    }

    /// Like [DescMut::set_string]; `None` leaves the field at "no string"
    pub fn set_opt_string(&mut self, field: &Field, s: Option<&str>) -> Result<&mut Self> {
        match s {
            Some(s) => self.set_string(field, s),
            None => Ok(self),
        }
    }

    pub fn set_subordinate_interface(&mut self, n: usize, value: u8) -> Result<&mut Self> {
        self.desc.put_subordinate_interface(n, value)?;
        Ok(self)
    }

    pub fn set_feature_controls(&mut self, channel: usize, value: u32) -> Result<&mut Self> {
        self.desc.put_feature_controls(channel, value)?;
        Ok(self)
    }

    /// Configuration attributes; bit 7 stays set
    pub fn set_attributes(&mut self, attributes: ConfigAttributes) -> Result<&mut Self> {
        self.set(&configuration::ATTRIBUTES, attributes.bits() as u32)
    }

    /// Mark a device descriptor as a composite device using interface associations
    pub fn set_iad_multifunction(&mut self) -> Result<&mut Self> {
        self.set(&device::DEVICE_CLASS, ClassCode::Misc as u32)?
            .set(&device::DEVICE_SUBCLASS, 0x02)?
            .set(&device::DEVICE_PROTOCOL, 0x01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DESCRIPTOR_TYPE, LENGTH, device, interface};

    #[test]
    fn handles_and_lookup() {
        let mut ctx = Context::new();
        let dev = ctx.add_device().unwrap().id();
        ctx.add_configuration().unwrap();
        let if0 = ctx.add_interface().unwrap().id();
        let if1 = ctx.add_interface().unwrap().id();
        assert_eq!(ctx.find_nth_of_type(0x01, 0).unwrap(), dev);
        assert_eq!(ctx.find_nth_of_type(0x04, 0).unwrap(), if0);
        assert_eq!(ctx.find_nth_of_type(0x04, 1).unwrap(), if1);
        assert!(matches!(
            ctx.find_nth_of_type(0x04, 2),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn strings_are_shared_between_fields() {
        let mut ctx = Context::new();
        let dev = ctx
            .add_device()
            .unwrap()
            .set_string(&device::PRODUCT, "Widget")
            .unwrap()
            .set_string(&device::MANUFACTURER, "Acme")
            .unwrap()
            .id();
        let ifc = ctx
            .add_interface()
            .unwrap()
            .set_string(&interface::INTERFACE, "Widget")
            .unwrap()
            .id();
        assert_eq!(ctx.get(dev).unwrap().get(&device::PRODUCT), 1);
        assert_eq!(ctx.get(ifc).unwrap().get(&interface::INTERFACE), 1);
        assert_eq!(
            ctx.get_string(dev, &device::MANUFACTURER).unwrap(),
            Some("Acme")
        );
        assert_eq!(ctx.get_string(dev, &device::SERIAL_NUMBER).unwrap(), None);
    }

    #[test]
    fn set_field_by_name() {
        let mut ctx = Context::new();
        let id = ctx
            .add_device()
            .unwrap()
            .set_field("idVendor", 0x1209)
            .unwrap()
            .id();
        assert_eq!(ctx.get(id).unwrap().get(&device::ID_VENDOR), 0x1209);
        assert!(ctx.edit(id).unwrap().set_field("bogus", 1).is_err());
    }

    #[test]
    fn serializing_requires_finalize() {
        let ctx = Context::new();
        assert!(matches!(ctx.to_bytes(), Err(Error::NotFinalized)));
        assert!(matches!(ctx.table(), Err(Error::NotFinalized)));
    }

    #[test]
    fn iad_multifunction_sets_misc_class() {
        let mut ctx = Context::new();
        let id = ctx
            .add_device()
            .unwrap()
            .set_iad_multifunction()
            .unwrap()
            .id();
        let d = ctx.get(id).unwrap();
        assert_eq!(d.bytes()[4..7], [0xEF, 0x02, 0x01]);
        let cfg = ctx.add_configuration().unwrap().id();
        assert!(ctx.edit(cfg).unwrap().set_iad_multifunction().is_err());
    }

    #[test]
    fn kind_tag_and_length_are_fixed() {
        let mut ctx = Context::new();
        let id = ctx.add_configuration().unwrap().id();
        let mut cfg = ctx.edit(id).unwrap();
        assert!(matches!(
            cfg.set(&DESCRIPTOR_TYPE, 0x05),
            Err(Error::InvalidLayout(_))
        ));
        assert!(matches!(cfg.set(&LENGTH, 3), Err(Error::InvalidLayout(_))));
        assert!(cfg.set_field("bDescriptorType", 0x05).is_err());
        assert_eq!(ctx.get(id).unwrap().bytes()[..2], [9, 0x02]);
        assert!(ctx.find_nth_of_type(0x05, 0).is_err());
    }

    #[test]
    fn foreign_fields_are_rejected() {
        let mut ctx = Context::new();
        let id = ctx.add_interface().unwrap().id();
        let res = ctx.edit(id).unwrap().set_string(&device::PRODUCT, "x").map(|_| ());
        assert!(matches!(res, Err(Error::NotFound(_))));
        assert!(ctx.strings().is_empty());
        let res = ctx.edit(id).unwrap().set(&device::ID_VENDOR, 1).map(|_| ());
        assert!(matches!(res, Err(Error::NotFound(_))));
    }
}
