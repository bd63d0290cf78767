//! Byte-level listing of an emitted table.

use crate::error::Result;
use crate::record::Field;
use std::fmt;
use std::io::Write;

/// One byte of an emitted table with its provenance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub index: usize,
    pub value: u8,
    /// Name of the record the byte belongs to
    pub record: &'static str,
    /// Named field covering the byte; `None` for variable tails and payloads
    pub field: Option<&'static str>,
    /// First byte of its record
    pub starts_record: bool,
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4} => 0x{:02x}", self.index, self.value)?;
        if let Some(field) = self.field {
            write!(f, "  {field}")?;
        }
        Ok(())
    }
}

/// Label every byte of consecutive records
pub(crate) fn label<'a, I>(records: I) -> Vec<TableEntry>
where
    I: IntoIterator<Item = (&'static str, &'static [Field], &'a [u8])>,
{
    let mut entries = vec![];
    for (record, fields, bytes) in records {
        for (pos, value) in bytes.iter().enumerate() {
            entries.push(TableEntry {
                index: entries.len(),
                value: *value,
                record,
                field: fields.iter().find(|f| f.covers(pos)).map(|f| f.name),
                starts_record: pos == 0,
            });
        }
    }
    entries
}

/// Plain listing, one line per byte, each record introduced by a comment line
pub(crate) fn write<W: Write>(entries: &[TableEntry], w: &mut W) -> Result<()> {
    for entry in entries {
        if entry.starts_record {
            writeln!(w, "-- {}", entry.record)?;
        }
        writeln!(w, "{entry}")?;
    }
    Ok(())
}
