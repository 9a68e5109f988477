use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::bloom::InterleavedBloomFilter;
use crate::error::{Error, Result};
use crate::hibf::HierarchicalInterleavedBloomFilter;

/// Magic number identifying index files: "HIBF_IDX".
pub const HIBF_MAGIC: u64 = 0x5844_495F_4642_4948;

/// Current on-disk format version.
pub const FORMAT_VERSION: u64 = 1;

/// Encoded `None` link.
const NO_LINK: u64 = u64::MAX;

const CRC_SIZE: usize = 4;

/// On-disk format, all integers little-endian u64 except the CRC:
///
/// ```text
/// ┌───────────┬─────────────┬────────────┐
/// │ Magic (8B)│ Version (8B)│ Slots (8B) │
/// ├───────────┴─────────────┴────────────┴──────────────────────────┐
/// │ per slot: bin_count │ bin_size │ hash_count │ word count │ words │
/// │           child link × bin_count │ user bin link × bin_count     │
/// ├─────────────────────────────────────────────────────────────────┤
/// │ CRC32 (4B) over everything above                                │
/// └─────────────────────────────────────────────────────────────────┘
/// ```
impl HierarchicalInterleavedBloomFilter {
    /// Serialize the whole index.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, HIBF_MAGIC);
        put_u64(&mut buf, FORMAT_VERSION);
        put_u64(&mut buf, self.len() as u64);

        for slot in 0..self.len() {
            let ibf = self.filter(slot);
            put_u64(&mut buf, ibf.bin_count() as u64);
            put_u64(&mut buf, ibf.bin_size() as u64);
            put_u64(&mut buf, ibf.hash_count() as u64);
            put_u64(&mut buf, ibf.words().len() as u64);
            for &word in ibf.words() {
                put_u64(&mut buf, word);
            }
            for link in self.child_links(slot).iter().chain(self.user_bin_links(slot)) {
                put_u64(&mut buf, link.map_or(NO_LINK, |l| l as u64));
            }
        }

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize an index, verifying magic, version and checksum.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < CRC_SIZE {
            return Err(Error::Corruption("index too short".into()));
        }
        let (body, crc_bytes) = data.split_at(data.len() - CRC_SIZE);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if crc32fast::hash(body) != stored_crc {
            return Err(Error::Corruption("CRC mismatch".into()));
        }

        let mut reader = Reader { data: body, offset: 0 };
        let magic = reader.u64()?;
        if magic != HIBF_MAGIC {
            return Err(Error::Corruption(format!(
                "bad magic: expected {HIBF_MAGIC:#x}, got {magic:#x}"
            )));
        }
        let version = reader.u64()?;
        if version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported format version {version}"
            )));
        }

        let slots = reader.usize()?;
        let mut hibf = HierarchicalInterleavedBloomFilter::default();
        for slot in 0..slots {
            let bin_count = reader.usize()?;
            let bin_size = reader.usize()?;
            let hash_count = reader.usize()?;
            let word_count = reader.usize()?;
            let words = (0..word_count).map(|_| reader.u64()).collect::<Result<Vec<_>>>()?;
            let ibf = InterleavedBloomFilter::from_parts(bin_count, bin_size, hash_count, words)
                .ok_or_else(|| Error::Corruption(format!("inconsistent filter in slot {slot}")))?;
            let child_links = reader.links(bin_count)?;
            let user_bin_links = reader.links(bin_count)?;
            check_links(slot, slots, &child_links, &user_bin_links)?;
            hibf.push(ibf, child_links, user_bin_links);
        }

        if reader.offset != body.len() {
            return Err(Error::Corruption(format!(
                "{} trailing bytes",
                body.len() - reader.offset
            )));
        }
        Ok(hibf)
    }

    /// Write the encoded index to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&self.encode())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read an index written by [`write_to`](Self::write_to).
    pub fn read_from(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::decode(&data)
    }
}

/// Child links must point at an existing slot, and a bin holds either a
/// lower-level filter or a user bin, never both.
fn check_links(
    slot: usize,
    slots: usize,
    child_links: &[Option<usize>],
    user_bin_links: &[Option<usize>],
) -> Result<()> {
    for (bin, (child, user_bin)) in child_links.iter().zip(user_bin_links).enumerate() {
        match (child, user_bin) {
            (Some(child), _) if *child >= slots => {
                return Err(Error::Corruption(format!(
                    "slot {slot} bin {bin} links to slot {child} of {slots}"
                )));
            }
            (Some(_), Some(_)) => {
                return Err(Error::Corruption(format!(
                    "slot {slot} bin {bin} has both a child and a user bin link"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn u64(&mut self) -> Result<u64> {
        let bytes = self
            .data
            .get(self.offset..self.offset + 8)
            .ok_or_else(|| Error::Corruption("index truncated".into()))?;
        self.offset += 8;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn usize(&mut self) -> Result<usize> {
        let value = self.u64()?;
        usize::try_from(value)
            .map_err(|_| Error::Corruption(format!("value {value} does not fit in usize")))
    }

    fn links(&mut self, count: usize) -> Result<Vec<Option<usize>>> {
        (0..count)
            .map(|_| {
                let value = self.u64()?;
                Ok((value != NO_LINK).then_some(value as usize))
            })
            .collect()
    }
}
