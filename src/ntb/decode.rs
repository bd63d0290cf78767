//! NTB16 parser
use crate::error::{Error, Result};
use crate::record::Field;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashSet;
use super::{
    CRC_LEN, CRC32, CrcTrailer, NDP16_CRC_FLAG, NDP16_SIGNATURE, NTH16_SIGNATURE, ndp16, nth16,
};

/// One pointer table of a received block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedNdp {
    /// Offset from the start of the block
    pub offset: usize,
    pub crc: CrcTrailer,
    /// Datagrams in table order, CRC trailer included
    pub datagrams: Vec<Vec<u8>>,
}

/// A received block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedNtb {
    pub sequence: u16,
    /// As found on the wire; 0 if omitted
    pub block_length: u16,
    /// Tables in chain order
    pub tables: Vec<DecodedNdp>,
}

impl DecodedNtb {
    /// Datagram payloads in chain order, CRC trailers checked and removed
    pub fn payloads(&self) -> Result<Vec<&[u8]>> {
        let mut out = vec![];
        for table in &self.tables {
            for dg in &table.datagrams {
                out.push(match table.crc {
                    CrcTrailer::None => dg.as_slice(),
                    CrcTrailer::Crc32 => strip_crc(dg)?,
                });
            }
        }
        Ok(out)
    }
}

fn strip_crc(dg: &[u8]) -> Result<&[u8]> {
    if dg.len() < CRC_LEN {
        return Err(Error::InvalidLayout(format!(
            "datagram of {} bytes cannot hold a CRC",
            dg.len()
        )));
    }
    let (body, trailer) = dg.split_at(dg.len() - CRC_LEN);
    let expected = LittleEndian::read_u32(trailer);
    let actual = CRC32.checksum(body);
    if actual != expected {
        return Err(Error::InvalidLayout(format!(
            "datagram CRC {actual:#010x} does not match trailer {expected:#010x}"
        )));
    }
    Ok(body)
}

fn read(bytes: &[u8], at: usize, field: &Field) -> usize {
    let start = at + field.offset;
    LittleEndian::read_uint(&bytes[start..start + field.width], field.width) as usize
}

fn invalid(msg: String) -> Error {
    Error::InvalidLayout(msg)
}

fn decode_ndp(block: &[u8], offset: usize) -> Result<(DecodedNdp, usize)> {
    if offset < nth16::LEN || offset + ndp16::HEADER_LEN > block.len() {
        return Err(invalid(format!("NDP offset {offset} outside the block")));
    }
    let signature = read(block, offset, &ndp16::SIGNATURE) as u32;
    let crc = match signature {
        s if s == NDP16_SIGNATURE => CrcTrailer::None,
        s if s == NDP16_SIGNATURE | NDP16_CRC_FLAG => CrcTrailer::Crc32,
        s => return Err(invalid(format!("bad NDP signature {s:#010x} at {offset}"))),
    };
    let len = read(block, offset, &ndp16::LENGTH);
    if len < ndp16::MIN_LEN || len % 4 != 0 || offset + len > block.len() {
        return Err(invalid(format!("bad NDP length {len} at {offset}")));
    }
    let next = read(block, offset, &ndp16::NEXT_NDP_INDEX);

    let mut datagrams = vec![];
    let mut n = 0;
    loop {
        let pair = ndp16::index(n);
        if pair.offset + ndp16::PAIR_LEN > len {
            return Err(invalid(format!("NDP at {offset} is not terminated")));
        }
        let index = read(block, offset, &pair);
        let length = read(block, offset, &ndp16::length(n));
        if index == 0 {
            break;
        }
        if index < nth16::LEN || index + length > block.len() {
            return Err(invalid(format!(
                "datagram {n} of NDP at {offset} ({index}+{length}) outside the block"
            )));
        }
        datagrams.push(block[index..index + length].to_vec());
        n += 1;
    }
    Ok((
        DecodedNdp {
            offset,
            crc,
            datagrams,
        },
        next,
    ))
}

/// Parse one block at the start of `bytes`
///
/// Returns the block and the number of bytes it occupies. A block without
/// `wBlockLength` extends to the end of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<(DecodedNtb, usize)> {
    if bytes.len() < nth16::LEN {
        return Err(invalid(format!("{} bytes is too short for NTH16", bytes.len())));
    }
    if read(bytes, 0, &nth16::SIGNATURE) as u32 != NTH16_SIGNATURE {
        return Err(invalid("bad NTH16 signature".to_string()));
    }
    let header_len = read(bytes, 0, &nth16::HEADER_LENGTH);
    if header_len != nth16::LEN {
        return Err(invalid(format!("bad NTH16 header length {header_len}")));
    }
    let sequence = read(bytes, 0, &nth16::SEQUENCE) as u16;
    let block_length = read(bytes, 0, &nth16::BLOCK_LENGTH);
    let end = match block_length {
        0 => bytes.len(),
        n if n < nth16::LEN || n > bytes.len() => {
            return Err(invalid(format!(
                "block length {n} with {} bytes available",
                bytes.len()
            )));
        }
        n => n,
    };
    let block = &bytes[..end];

    let mut tables = vec![];
    let mut seen = HashSet::new();
    let mut next = read(block, 0, &nth16::NDP_INDEX);
    if next == 0 {
        return Err(invalid("block holds no NDP".to_string()));
    }
    while next != 0 {
        if !seen.insert(next) {
            return Err(invalid(format!("NDP chain loops back to {next}")));
        }
        let (table, following) = decode_ndp(block, next)?;
        tables.push(table);
        next = following;
    }
    Ok((
        DecodedNtb {
            sequence,
            block_length: block_length as u16,
            tables,
        },
        end,
    ))
}

/// Parse consecutive blocks until `bytes` is used up
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<DecodedNtb>> {
    let mut blocks = vec![];
    let mut pos = 0;
    while pos < bytes.len() {
        let (ntb, used) = decode(&bytes[pos..])?;
        blocks.push(ntb);
        pos += used;
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header, one NDP at 12 with a single 4-byte datagram at 28
    fn minimal() -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(b"NCMH");
        b.extend_from_slice(&[12, 0, 7, 0, 32, 0, 12, 0]);
        b.extend_from_slice(b"NCM0");
        b.extend_from_slice(&[16, 0, 0, 0, 28, 0, 4, 0, 0, 0, 0, 0]);
        b.extend_from_slice(&[1, 2, 3, 4]);
        b
    }

    #[test]
    fn decodes_hand_built_block() {
        let (ntb, used) = decode(&minimal()).unwrap();
        assert_eq!(used, 32);
        assert_eq!(ntb.sequence, 7);
        assert_eq!(ntb.payloads().unwrap(), [&[1u8, 2, 3, 4][..]]);
    }

    #[test]
    fn rejects_bad_headers() {
        let mut b = minimal();
        b[0] = b'X';
        assert!(matches!(decode(&b), Err(Error::InvalidLayout(_))));
        let mut b = minimal();
        b[4] = 16;
        assert!(decode(&b).is_err());
        let mut b = minimal();
        b[8] = 64;
        assert!(decode(&b).is_err());
        assert!(decode(&minimal()[..8]).is_err());
    }

    #[test]
    fn rejects_bad_tables() {
        // NCM2
        let mut b = minimal();
        b[15] = b'2';
        assert!(decode(&b).is_err());
        // length not a multiple of 4
        let mut b = minimal();
        b[16] = 18;
        assert!(decode(&b).is_err());
        // datagram beyond the block
        let mut b = minimal();
        b[22] = 5;
        assert!(decode(&b).is_err());
        // chain pointing back at itself
        let mut b = minimal();
        b[18] = 12;
        assert!(matches!(decode(&b), Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn crc_is_checked() {
        let mut b = minimal();
        b[15] = b'1';
        // 1,2,3,4 is not followed by its CRC
        let (ntb, _) = decode(&b).unwrap();
        assert_eq!(ntb.tables[0].crc, CrcTrailer::Crc32);
        assert!(matches!(ntb.payloads(), Err(Error::InvalidLayout(_))));
    }
}
