use crate::consts::DescriptorType;
use crate::error::{Error, Result};
use num_traits::FromPrimitive;

/// Split a descriptor table into its descriptors
///
/// Each entry carries the decoded descriptor type, if known. Fails on a zero length
/// byte or a descriptor running past the end of `table`.
pub fn split_descriptors(table: &[u8]) -> Result<Vec<(Option<DescriptorType>, &[u8])>> {
    let mut out = vec![];
    let mut offset = 0;
    while offset < table.len() {
        let len = table[offset] as usize;
        if len == 0 || offset + len > table.len() {
            return Err(Error::InvalidLayout(format!(
                "descriptor at {offset} with length {len} in a table of {} bytes",
                table.len()
            )));
        }
        let desc = &table[offset..offset + len];
        let typ = desc.get(1).and_then(|t| DescriptorType::from_u8(*t));
        out.push((typ, desc));
        offset += len;
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod tests;
