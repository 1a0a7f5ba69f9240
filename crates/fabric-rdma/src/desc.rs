//! Descriptor headers stored at the front of every pool object.
//!
//! Layout (little endian):
//!
//! ```text
//! base:   mem_key u64 | ep_id u64 | op u32 | flags u32 | len u64          (32 bytes)
//! fetch:  base | user_buffer u64 | padding u32 | expected_len u32
//!              | completion_id u64 | reserved u64                        (64 bytes)
//! ```

use byteorder::{ByteOrder, LittleEndian};

pub const BASE_DESC_SIZE: usize = 32;
pub const FETCH_DESC_SIZE: usize = BASE_DESC_SIZE + 32;
/// Result slot of a fetching atomic.
pub const ATOMIC_RESULT_SIZE: usize = 8;

const MEM_KEY: usize = 0;
const EP_ID: usize = 8;
const OP: usize = 16;
const FLAGS: usize = 20;
const LEN: usize = 24;
const USER_BUFFER: usize = 32;
const PADDING: usize = 40;
const EXPECTED_LEN: usize = 44;
const COMPLETION_ID: usize = 48;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseDesc {
    pub mem_key: u64,
    pub ep_id: u64,
    pub op: u32,
    pub flags: u32,
    pub len: u64,
}

impl BaseDesc {
    pub fn read(buf: &[u8]) -> Self {
        Self {
            mem_key: LittleEndian::read_u64(&buf[MEM_KEY..]),
            ep_id: LittleEndian::read_u64(&buf[EP_ID..]),
            op: LittleEndian::read_u32(&buf[OP..]),
            flags: LittleEndian::read_u32(&buf[FLAGS..]),
            len: LittleEndian::read_u64(&buf[LEN..]),
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(&mut buf[MEM_KEY..], self.mem_key);
        LittleEndian::write_u64(&mut buf[EP_ID..], self.ep_id);
        LittleEndian::write_u32(&mut buf[OP..], self.op);
        LittleEndian::write_u32(&mut buf[FLAGS..], self.flags);
        LittleEndian::write_u64(&mut buf[LEN..], self.len);
    }
}

/// Header of descriptors whose completion delivers data back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchDesc {
    pub base: BaseDesc,
    pub user_buffer: u64,
    /// Leading bytes skipped when the remote address was unaligned.
    pub padding: u32,
    pub expected_len: u32,
    pub completion_id: u64,
}

impl FetchDesc {
    pub fn read(buf: &[u8]) -> Self {
        Self {
            base: BaseDesc::read(buf),
            user_buffer: LittleEndian::read_u64(&buf[USER_BUFFER..]),
            padding: LittleEndian::read_u32(&buf[PADDING..]),
            expected_len: LittleEndian::read_u32(&buf[EXPECTED_LEN..]),
            completion_id: LittleEndian::read_u64(&buf[COMPLETION_ID..]),
        }
    }

    pub fn write(&self, buf: &mut [u8]) {
        self.base.write(buf);
        LittleEndian::write_u64(&mut buf[USER_BUFFER..], self.user_buffer);
        LittleEndian::write_u32(&mut buf[PADDING..], self.padding);
        LittleEndian::write_u32(&mut buf[EXPECTED_LEN..], self.expected_len);
        LittleEndian::write_u64(&mut buf[COMPLETION_ID..], self.completion_id);
    }
}

/// Initializer for pools whose memory is not registered.
pub fn base_desc_init(obj: &mut [u8]) {
    let n = obj.len().min(FETCH_DESC_SIZE);
    obj[..n].fill(0);
}

/// Initializer for registered pools: every descriptor carries its chunk's key.
pub fn desc_key_init(key: u64, obj: &mut [u8]) {
    base_desc_init(obj);
    LittleEndian::write_u64(&mut obj[MEM_KEY..], key);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_desc_layout() {
        let mut buf = [0xffu8; BASE_DESC_SIZE];
        let desc = BaseDesc {
            mem_key: 0x1122_3344_5566_7788,
            ep_id: 3,
            op: 7,
            flags: 1,
            len: 2048,
        };
        desc.write(&mut buf);
        assert_eq!(buf[0], 0x88);
        assert_eq!(&buf[16..20], &[7, 0, 0, 0]);
        assert_eq!(BaseDesc::read(&buf), desc);
    }

    #[test]
    fn test_fetch_desc_extends_base() {
        let mut buf = vec![0u8; FETCH_DESC_SIZE + ATOMIC_RESULT_SIZE];
        let desc = FetchDesc {
            base: BaseDesc {
                len: 8,
                ..Default::default()
            },
            user_buffer: 0xdead_beef,
            padding: 3,
            expected_len: 5,
            completion_id: 42,
        };
        desc.write(&mut buf);
        assert_eq!(FetchDesc::read(&buf), desc);
        assert_eq!(BaseDesc::read(&buf).len, 8);
        assert!(buf[FETCH_DESC_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_initializers() {
        let mut obj = vec![0xaau8; FETCH_DESC_SIZE + 16];
        base_desc_init(&mut obj);
        assert!(obj[..FETCH_DESC_SIZE].iter().all(|&b| b == 0));
        assert!(obj[FETCH_DESC_SIZE..].iter().all(|&b| b == 0xaa));

        desc_key_init(99, &mut obj);
        assert_eq!(BaseDesc::read(&obj).mem_key, 99);
        assert_eq!(BaseDesc::read(&obj).len, 0);

        let mut small = vec![0xaau8; BASE_DESC_SIZE];
        desc_key_init(5, &mut small);
        assert_eq!(BaseDesc::read(&small).mem_key, 5);
    }
}
