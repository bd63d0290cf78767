//! CDC-NCM transfer blocks (NTB16).
//!
//! An [Ntb] is assembled from a header, datagram pointer tables (NDPs) and datagrams.
//! Tables and datagrams are created first and placed into the frame in any order;
//! [Ntb::wrap] then aligns the first table, assigns offsets and fills in lengths,
//! pointer pairs and the chain of table links.

use crate::error::{Error, Result};
use crate::record::{Field, Record};
use crate::table::{self, TableEntry};
use crc::{CRC_32_ISO_HDLC, Crc};
use log::*;

pub mod decode;
pub use decode::{DecodedNdp, DecodedNtb, decode, decode_stream};

pub const NTH16_SIGNATURE: u32 = u32::from_le_bytes(*b"NCMH");
pub const NDP16_SIGNATURE: u32 = u32::from_le_bytes(*b"NCM0");
/// Set in the last signature byte when datagrams carry a CRC-32 trailer
pub const NDP16_CRC_FLAG: u32 = 0x0100_0000;

/// Ethernet frame check sequence
pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
pub const CRC_LEN: usize = 4;

/// Transfer header
pub mod nth16 {
    use crate::record::Field;

    pub const SIGNATURE: Field = Field::int("dwSignature", 0, 4);
    pub const HEADER_LENGTH: Field = Field::int("wHeaderLength", 4, 2);
    pub const SEQUENCE: Field = Field::int("wSequence", 6, 2);
    pub const BLOCK_LENGTH: Field = Field::int("wBlockLength", 8, 2);
    pub const NDP_INDEX: Field = Field::int("wNdpIndex", 10, 2);

    pub const LEN: usize = 12;
    pub const FIELDS: &[Field] = &[SIGNATURE, HEADER_LENGTH, SEQUENCE, BLOCK_LENGTH, NDP_INDEX];
}

/// Datagram pointer table; (wDatagramIndex, wDatagramLength) pairs follow the fixed part
pub mod ndp16 {
    use crate::record::Field;

    pub const SIGNATURE: Field = Field::int("dwSignature", 0, 4);
    pub const LENGTH: Field = Field::int("wLength", 4, 2);
    pub const NEXT_NDP_INDEX: Field = Field::int("wNextNdpIndex", 6, 2);

    /// Fixed part before the first pair
    pub const HEADER_LEN: usize = 8;
    pub const PAIR_LEN: usize = 4;
    /// One pair plus the terminator
    pub const MIN_LEN: usize = HEADER_LEN + 2 * PAIR_LEN;
    pub const FIELDS: &[Field] = &[SIGNATURE, LENGTH, NEXT_NDP_INDEX];

    /// Length of a table holding `datagrams` pairs and the terminator
    pub fn len(datagrams: usize) -> usize {
        HEADER_LEN + PAIR_LEN * datagrams.max(1) + PAIR_LEN
    }

    pub fn index(n: usize) -> Field {
        Field::int("wDatagramIndex", HEADER_LEN + PAIR_LEN * n, 2)
    }

    pub fn length(n: usize) -> Field {
        Field::int("wDatagramLength", HEADER_LEN + PAIR_LEN * n + 2, 2)
    }
}

/// Whether the datagrams of a table end in a CRC-32
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrcTrailer {
    #[default]
    None,
    Crc32,
}

/// `wBlockLength` policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockLength {
    #[default]
    Included,
    /// Written as 0; the block ends with the transfer
    Omitted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NdpId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DatagramId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Element {
    Header,
    Pad(usize),
    Table(NdpId),
    Datagram(DatagramId),
}

#[derive(Debug)]
struct Ndp {
    crc: CrcTrailer,
    datagrams: Vec<DatagramId>,
    placed: bool,
    offset: usize,
    record: Record,
}

#[derive(Debug)]
struct Datagram {
    ndp: NdpId,
    payload: Vec<u8>,
    placed: bool,
    offset: usize,
}

/// Hands out transfer blocks with consecutive sequence numbers
#[derive(Clone, Debug)]
pub struct NtbSession {
    next_sequence: u16,
}

impl Default for NtbSession {
    fn default() -> Self {
        Self::new()
    }
}

impl NtbSession {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(sequence: u16) -> Self {
        Self {
            next_sequence: sequence,
        }
    }

    pub fn ntb(&mut self) -> Ntb {
        let ntb = Ntb::new(self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        ntb
    }
}

/// One NTB16 frame under construction
#[derive(Debug)]
pub struct Ntb {
    header: Record,
    elements: Vec<Element>,
    tables: Vec<Ndp>,
    datagrams: Vec<Datagram>,
    wrapped: bool,
}

impl Ntb {
    pub fn new(sequence: u16) -> Self {
        let mut header = Record::zeroed(nth16::LEN);
        header.put(&nth16::SIGNATURE, NTH16_SIGNATURE);
        header.put(&nth16::HEADER_LENGTH, nth16::LEN as u32);
        header.put(&nth16::SEQUENCE, sequence as u32);
        Self {
            header,
            elements: vec![Element::Header],
            tables: vec![],
            datagrams: vec![],
            wrapped: false,
        }
    }

    pub fn sequence(&self) -> u16 {
        self.header.get(&nth16::SEQUENCE) as u16
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.wrapped {
            return Err(Error::LockedState);
        }
        Ok(())
    }

    fn ndp(&self, id: NdpId) -> Result<&Ndp> {
        self.tables
            .get(id.0)
            .ok_or_else(|| Error::NotFound(format!("NDP #{}", id.0)))
    }

    fn ndp_mut(&mut self, id: NdpId) -> Result<&mut Ndp> {
        self.tables
            .get_mut(id.0)
            .ok_or_else(|| Error::NotFound(format!("NDP #{}", id.0)))
    }

    fn datagram_entry(&self, id: DatagramId) -> Result<&Datagram> {
        self.datagrams
            .get(id.0)
            .ok_or_else(|| Error::NotFound(format!("datagram #{}", id.0)))
    }

    /// Create a pointer table; it is not part of the frame until [Ntb::push_table]
    pub fn new_table(&mut self, crc: CrcTrailer) -> Result<NdpId> {
        self.check_unlocked()?;
        self.tables.push(Ndp {
            crc,
            datagrams: vec![],
            placed: false,
            offset: 0,
            record: Record::default(),
        });
        Ok(NdpId(self.tables.len() - 1))
    }

    /// Change the CRC mode of a table that holds no datagrams yet
    pub fn set_crc_trailer(&mut self, ndp: NdpId, crc: CrcTrailer) -> Result<()> {
        self.check_unlocked()?;
        let table = self.ndp_mut(ndp)?;
        if !table.datagrams.is_empty() {
            return Err(Error::LockedState);
        }
        table.crc = crc;
        Ok(())
    }

    /// Create a datagram owned by `ndp`
    ///
    /// A CRC-32 over `payload` is appended if the table carries CRC trailers. Fails once
    /// the table has been placed in the frame.
    pub fn new_datagram(&mut self, ndp: NdpId, payload: &[u8]) -> Result<DatagramId> {
        self.check_unlocked()?;
        let id = DatagramId(self.datagrams.len());
        let table = self.ndp_mut(ndp)?;
        if table.placed {
            return Err(Error::LockedState);
        }
        let mut payload = payload.to_vec();
        if table.crc == CrcTrailer::Crc32 {
            let crc = CRC32.checksum(&payload);
            payload.extend_from_slice(&crc.to_le_bytes());
        }
        table.datagrams.push(id);
        self.datagrams.push(Datagram {
            ndp,
            payload,
            placed: false,
            offset: 0,
        });
        Ok(id)
    }

    /// Place `ndp` at the current end of the frame and lock its datagram list
    pub fn push_table(&mut self, ndp: NdpId) -> Result<()> {
        self.check_unlocked()?;
        let table = self.ndp_mut(ndp)?;
        if table.placed {
            return Err(Error::DuplicateAttach(format!("NDP #{}", ndp.0)));
        }
        table.placed = true;
        self.elements.push(Element::Table(ndp));
        Ok(())
    }

    /// Place `datagram` at the current end of the frame
    pub fn push_datagram(&mut self, datagram: DatagramId) -> Result<()> {
        self.check_unlocked()?;
        let entry = self
            .datagrams
            .get_mut(datagram.0)
            .ok_or_else(|| Error::NotFound(format!("datagram #{}", datagram.0)))?;
        if entry.placed {
            return Err(Error::DuplicateAttach(format!("datagram #{}", datagram.0)));
        }
        entry.placed = true;
        self.elements.push(Element::Datagram(datagram));
        Ok(())
    }

    fn element_len(&self, element: Element) -> usize {
        match element {
            Element::Header => nth16::LEN,
            Element::Pad(n) => n,
            Element::Table(id) => ndp16::len(self.tables[id.0].datagrams.len()),
            Element::Datagram(id) => self.datagrams[id.0].payload.len(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.tables.iter().any(|t| t.placed) {
            return Err(Error::InvalidLayout("frame holds no NDP".to_string()));
        }
        for (i, table) in self.tables.iter().enumerate() {
            if !table.placed {
                if !table.datagrams.is_empty() {
                    return Err(Error::NotFound(format!(
                        "NDP #{i} owns datagrams but is not in the frame"
                    )));
                }
                warn!("NDP #{i} is not part of the frame");
            }
        }
        if let Some(i) = self.datagrams.iter().position(|d| !d.placed) {
            return Err(Error::NotFound(format!(
                "datagram #{i} of NDP #{} is not in the frame",
                self.datagrams[i].ndp.0
            )));
        }
        Ok(())
    }

    /// Resolve offsets and links and lock the frame
    pub fn wrap(&mut self, block_length: BlockLength) -> Result<()> {
        if self.wrapped {
            return Err(Error::AlreadyFinalized);
        }
        self.validate()?;

        // the first NDP must be 4-byte aligned
        let mut pos = 0;
        let mut pad_at = None;
        for (i, element) in self.elements.iter().enumerate() {
            if let Element::Table(_) = element {
                let pad = (4 - pos % 4) % 4;
                if pad != 0 {
                    pad_at = Some((i, pad));
                }
                break;
            }
            pos += self.element_len(*element);
        }
        let total: usize = self.elements.iter().map(|e| self.element_len(*e)).sum::<usize>()
            + pad_at.map_or(0, |(_, pad)| pad);
        if total > u16::MAX as usize {
            return Err(Error::InvalidLayout(format!(
                "NTB16 of {total} bytes exceeds 65535"
            )));
        }
        if let Some((i, pad)) = pad_at {
            debug!("Padding {pad} bytes before the first NDP");
            self.elements.insert(i, Element::Pad(pad));
        }

        let mut pos = 0;
        let mut chain = vec![];
        for element in self.elements.clone() {
            match element {
                Element::Table(id) => {
                    self.tables[id.0].offset = pos;
                    chain.push(id);
                }
                Element::Datagram(id) => self.datagrams[id.0].offset = pos,
                _ => {}
            }
            pos += self.element_len(element);
        }

        let block = match block_length {
            BlockLength::Included => total,
            BlockLength::Omitted => 0,
        };
        self.header.put(&nth16::BLOCK_LENGTH, block as u32);
        self.header
            .put(&nth16::NDP_INDEX, self.tables[chain[0].0].offset as u32);

        for (n, id) in chain.iter().enumerate() {
            let next = chain.get(n + 1).map_or(0, |next| self.tables[next.0].offset);
            let record = self.table_record(*id, next);
            trace!(
                "NDP #{} at {}, next {next}",
                id.0,
                self.tables[id.0].offset
            );
            self.tables[id.0].record = record;
        }
        debug!(
            "Wrapped NTB {} with {} NDPs, {} datagrams, {total} bytes",
            self.sequence(),
            chain.len(),
            self.datagrams.len()
        );
        self.wrapped = true;
        Ok(())
    }

    fn table_record(&self, id: NdpId, next: usize) -> Record {
        let table = &self.tables[id.0];
        let len = ndp16::len(table.datagrams.len());
        let mut record = Record::zeroed(len);
        let mut signature = NDP16_SIGNATURE;
        if table.crc == CrcTrailer::Crc32 {
            signature |= NDP16_CRC_FLAG;
        }
        record.put(&ndp16::SIGNATURE, signature);
        record.put(&ndp16::LENGTH, len as u32);
        record.put(&ndp16::NEXT_NDP_INDEX, next as u32);
        for (n, dg) in table.datagrams.iter().enumerate() {
            let dg = &self.datagrams[dg.0];
            record.put(&ndp16::index(n), dg.offset as u32);
            record.put(&ndp16::length(n), dg.payload.len() as u32);
        }
        record
    }

    fn check_wrapped(&self) -> Result<()> {
        if !self.wrapped {
            return Err(Error::NotFinalized);
        }
        Ok(())
    }

    /// Datagram bytes as carried in the frame, CRC trailer included
    pub fn datagram(&self, id: DatagramId) -> Result<&[u8]> {
        Ok(&self.datagram_entry(id)?.payload)
    }

    pub fn table_offset(&self, ndp: NdpId) -> Result<usize> {
        self.check_wrapped()?;
        Ok(self.ndp(ndp)?.offset)
    }

    pub fn datagram_offset(&self, id: DatagramId) -> Result<usize> {
        self.check_wrapped()?;
        Ok(self.datagram_entry(id)?.offset)
    }

    fn records(&self) -> impl Iterator<Item = (&'static str, &'static [Field], &[u8])> + '_ {
        static PAD: [u8; 3] = [0; 3];
        const UNNAMED: &[Field] = &[];
        self.elements.iter().map(|element| match *element {
            Element::Header => ("NTH16", nth16::FIELDS, self.header.bytes()),
            Element::Pad(n) => ("Pad", UNNAMED, &PAD[..n]),
            Element::Table(id) => ("NDP16", ndp16::FIELDS, self.tables[id.0].record.bytes()),
            Element::Datagram(id) => ("Datagram", UNNAMED, self.datagrams[id.0].payload.as_slice()),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_wrapped()?;
        Ok(self.records().flat_map(|(_, _, b)| b.iter().copied()).collect())
    }

    pub fn table(&self) -> Result<Vec<TableEntry>> {
        self.check_wrapped()?;
        Ok(table::label(self.records()))
    }
}
