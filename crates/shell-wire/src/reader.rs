use shell_core::error::ShellError;
use shell_core::types::{Hash256, OutPoint};

/// Hard cap on any single length-prefixed field. Anything larger than the
/// largest conceivable block is an overlong prefix, not a real message.
pub const MAX_VAR_BYTES: u64 = 4_000_000;

/// A bounds-checked cursor over a byte slice. Every read either consumes
/// exactly the requested bytes or fails with `Malformed`.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless the whole input has been consumed.
    pub fn finish(self) -> Result<(), ShellError> {
        if self.remaining() != 0 {
            return Err(ShellError::Malformed(format!(
                "{} trailing byte(s) after message",
                self.remaining()
            )));
        }
        Ok(())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ShellError> {
        if self.remaining() < n {
            return Err(ShellError::Malformed(format!(
                "truncated: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ShellError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ShellError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ShellError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ShellError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_i32(&mut self) -> Result<i32, ShellError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, ShellError> {
        Ok(self.read_u64()? as i64)
    }

    /// CompactSize varint with canonicality enforcement: a value encoded in
    /// a wider form than necessary is rejected.
    pub fn read_varint(&mut self) -> Result<u64, ShellError> {
        let tag = self.read_u8()?;
        let value = match tag {
            0xfd => {
                let v = self.read_u16()? as u64;
                if v < 0xfd {
                    return Err(ShellError::Malformed("non-canonical varint".into()));
                }
                v
            }
            0xfe => {
                let v = self.read_u32()? as u64;
                if v <= 0xffff {
                    return Err(ShellError::Malformed("non-canonical varint".into()));
                }
                v
            }
            0xff => {
                let v = self.read_u64()?;
                if v <= 0xffff_ffff {
                    return Err(ShellError::Malformed("non-canonical varint".into()));
                }
                v
            }
            small => small as u64,
        };
        Ok(value)
    }

    /// Length-prefixed byte string, bounded by `MAX_VAR_BYTES`.
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, ShellError> {
        let len = self.read_varint()?;
        if len > MAX_VAR_BYTES {
            return Err(ShellError::Malformed(format!(
                "length prefix {len} exceeds maximum"
            )));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn read_hash(&mut self) -> Result<Hash256, ShellError> {
        let b = self.take(32)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(b);
        Ok(Hash256::from_bytes(arr))
    }

    pub fn read_outpoint(&mut self) -> Result<OutPoint, ShellError> {
        let txid = self.read_hash()?;
        let index = self.read_u32()?;
        Ok(OutPoint { txid, index })
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => buf.push(value as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
