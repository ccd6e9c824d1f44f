//! Minimal class-file codec: enough structure to add interfaces and methods
//! while keeping every other byte of the class intact.

pub mod constant_pool;
pub mod mutf8;
pub mod record;
pub mod stub;

pub use record::{AttributeInfo, ClassRecord, MemberInfo};

/// Big-endian cursor over a class file.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| format!("unexpected end of data at offset {}", self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, String> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok((hi << 32) | lo)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Length prefix for a table, failing when it does not fit in `u16`.
pub(crate) fn table_len(len: usize, what: &str) -> Result<u16, String> {
    u16::try_from(len).map_err(|_| format!("too many {what} ({len})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_big_endian() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x07];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u32().unwrap(), 0xCAFEBABE);
        assert_eq!(r.u16().unwrap(), 52);
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.u8().unwrap(), 7);
        assert!(r.u8().is_err());
    }

    #[test]
    fn test_table_len_limit() {
        assert_eq!(table_len(3, "methods").unwrap(), 3);
        assert!(table_len(70_000, "methods").unwrap_err().contains("methods"));
    }
}
