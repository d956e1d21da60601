use alloc::sync::Arc;
use log::{debug, trace, warn};

use crate::{
    block_dev::BlockDevice,
    constant::{BlockAddr, BLOCK_SIZE, MAX_FILE_BLOCKS, MAX_FILE_SIZE, NULL, POINTERS_PER_INODE},
    error::{FsError, Result},
    inode::store_inode,
    layout::{IndexBlock, Inode, SuperBlock},
    sfs::{MountState, SimpleFs},
};

/// Resolves the block behind logical slot `n`, loading the indirect table
/// into `index` on first use. `NULL` marks a hole.
fn nth_data_block(
    sb: &SuperBlock,
    inode: &Inode,
    n: usize,
    index: &mut Option<IndexBlock>,
    device: &Arc<dyn BlockDevice>,
) -> BlockAddr {
    if n < POINTERS_PER_INODE {
        inode.direct[n]
    } else if n < MAX_FILE_BLOCKS && sb.is_data_block(inode.indirect) {
        index.get_or_insert_with(|| IndexBlock::load(device, inode.indirect)).0
            [n - POINTERS_PER_INODE]
    } else {
        NULL
    }
}

/// Returns the block behind slot `n`, claiming and linking one if the slot
/// is empty. The link is on disk before any data goes into the block.
/// `None` means the device is full or a stored pointer is out of range.
fn nth_data_block_or_claim(
    state: &mut MountState,
    device: &Arc<dyn BlockDevice>,
    inumber: u32,
    inode: &mut Inode,
    n: usize,
    index: &mut Option<IndexBlock>,
) -> Option<(BlockAddr, bool)> {
    if n < POINTERS_PER_INODE {
        if inode.direct[n] != NULL {
            return linked(state, inumber, inode.direct[n]);
        }
        let addr = state.claim()?;
        inode.direct[n] = addr;
        store_inode(device, inumber, inode);
        return Some((addr, true));
    }

    if inode.indirect != NULL && !state.sb.is_data_block(inode.indirect) {
        warn!("inode {inumber}: indirect block {} out of range", inode.indirect);
        return None;
    }
    if inode.indirect == NULL {
        let addr = state.claim()?;
        let table = IndexBlock::empty();
        table.store(device, addr);
        inode.indirect = addr;
        store_inode(device, inumber, inode);
        debug!("inode {inumber}: indirect block {addr}");
        *index = Some(table);
    }
    let table = index.get_or_insert_with(|| IndexBlock::load(device, inode.indirect));
    let entry = &mut table.0[n - POINTERS_PER_INODE];
    if *entry != NULL {
        return linked(state, inumber, *entry);
    }
    let addr = state.claim()?;
    *entry = addr;
    table.store(device, inode.indirect);
    Some((addr, true))
}

fn linked(state: &MountState, inumber: u32, addr: BlockAddr) -> Option<(BlockAddr, bool)> {
    if state.sb.is_data_block(addr) {
        Some((addr, false))
    } else {
        warn!("inode {inumber}: block {addr} out of range, write stopped");
        None
    }
}

impl SimpleFs {
    /// Copies up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Stops early at end of file or at the first unallocated block, so a
    /// short count is not an error. Byte values are never inspected.
    pub fn read(&self, inumber: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
        let state = self.mounted()?;
        let inode = state.valid_inode(&self.device, inumber)?;
        if offset >= inode.size {
            return Ok(0);
        }

        let end = (offset as usize + buf.len()).min(inode.size as usize);
        let mut index = None;
        let mut block = [0u8; BLOCK_SIZE];
        let mut pos = offset as usize;
        while pos < end {
            let addr = nth_data_block(&state.sb, &inode, pos / BLOCK_SIZE, &mut index, &self.device);
            if addr == NULL || !state.sb.is_data_block(addr) {
                trace!("inode {inumber}: hole at byte {pos}");
                break;
            }
            self.device.read_block(addr, &mut block);
            let start = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - start).min(end - pos);
            let copied = pos - offset as usize;
            buf[copied..copied + len].copy_from_slice(&block[start..start + len]);
            pos += len;
        }
        Ok(pos - offset as usize)
    }

    /// Writes `buf` at `offset`, allocating blocks as needed.
    ///
    /// Returns how many bytes landed; fewer than `buf.len()` when the device
    /// fills up or the write runs past [`MAX_FILE_SIZE`]. The size only grows.
    pub fn write(&mut self, inumber: u32, buf: &[u8], offset: u32) -> Result<usize> {
        let state = self.state.as_mut().ok_or(FsError::NotMounted)?;
        let device = &self.device;
        let mut inode = state.valid_inode(device, inumber)?;
        if offset as usize >= MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge(offset));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let end = (offset as usize + buf.len()).min(MAX_FILE_SIZE);
        let mut index = None;
        let mut block = [0u8; BLOCK_SIZE];
        let mut pos = offset as usize;
        while pos < end {
            let n = pos / BLOCK_SIZE;
            let Some((addr, fresh)) =
                nth_data_block_or_claim(state, device, inumber, &mut inode, n, &mut index)
            else {
                break;
            };
            let start = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - start).min(end - pos);
            if fresh {
                block.fill(0);
            } else if len < BLOCK_SIZE {
                device.read_block(addr, &mut block);
            }
            let consumed = pos - offset as usize;
            block[start..start + len].copy_from_slice(&buf[consumed..consumed + len]);
            device.write_block(addr, &block);
            pos += len;
        }

        let written = pos - offset as usize;
        if written == 0 {
            return Err(FsError::NoFreeBlock);
        }
        inode.size = inode.size.max(pos as u32);
        store_inode(device, inumber, &inode);
        trace!("inode {inumber}: wrote {written} bytes at {offset}");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_dev::MemDisk;
    use alloc::vec;

    fn mounted(blocks: u32) -> SimpleFs {
        let mut fs = SimpleFs::new(Arc::new(MemDisk::new(blocks)));
        fs.format().unwrap();
        fs.mount().unwrap();
        fs
    }

    #[test]
    fn unaligned_write_preserves_surrounding_bytes() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        fs.write(inumber, &[1u8; 3 * BLOCK_SIZE], 0).unwrap();
        assert_eq!(fs.write(inumber, &[9u8; 10], BLOCK_SIZE as u32 - 5), Ok(10));
        assert_eq!(fs.getsize(inumber), Ok(3 * BLOCK_SIZE as u32));

        let mut buf = vec![0u8; 3 * BLOCK_SIZE];
        assert_eq!(fs.read(inumber, &mut buf, 0), Ok(3 * BLOCK_SIZE));
        assert!(buf[..BLOCK_SIZE - 5].iter().all(|&b| b == 1));
        assert!(buf[BLOCK_SIZE - 5..BLOCK_SIZE + 5].iter().all(|&b| b == 9));
        assert!(buf[BLOCK_SIZE + 5..].iter().all(|&b| b == 1));
    }

    #[test]
    fn zero_bytes_are_ordinary_data() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data = [b'a', 0, 0, b'b', 0];
        fs.write(inumber, &data, 0).unwrap();

        let mut buf = [0xffu8; 8];
        assert_eq!(fs.read(inumber, &mut buf, 0), Ok(5));
        assert_eq!(&buf[..5], &data);
    }

    #[test]
    fn a_hole_ends_the_read() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let offset = 2 * BLOCK_SIZE as u32;
        assert_eq!(fs.write(inumber, b"tail", offset), Ok(4));
        assert_eq!(fs.getsize(inumber), Ok(offset + 4));
        assert_eq!(fs.stat(inumber).unwrap().direct, [0, 0, 3, 0, 0]);

        let mut buf = [0u8; 16];
        assert_eq!(fs.read(inumber, &mut buf, 0), Ok(0));
        assert_eq!(fs.read(inumber, &mut buf, offset), Ok(4));
        assert_eq!(&buf[..4], b"tail");
    }

    #[test]
    fn read_starts_mid_block_and_spans_blocks() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        let data: alloc::vec::Vec<u8> = (0..2 * BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
        fs.write(inumber, &data, 0).unwrap();

        let mut buf = [0u8; 100];
        let offset = BLOCK_SIZE - 50;
        assert_eq!(fs.read(inumber, &mut buf, offset as u32), Ok(100));
        assert_eq!(&buf[..], &data[offset..offset + 100]);

        let offset = 2 * BLOCK_SIZE - 30;
        assert_eq!(fs.read(inumber, &mut buf, offset as u32), Ok(30));
        assert_eq!(&buf[..30], &data[offset..]);
    }

    #[test]
    fn overwrite_inside_the_file_keeps_the_size() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        fs.write(inumber, &[7u8; 1000], 0).unwrap();
        let free = fs.free_blocks().unwrap();
        assert_eq!(fs.write(inumber, b"xyz", 10), Ok(3));
        assert_eq!(fs.getsize(inumber), Ok(1000));
        assert_eq!(fs.free_blocks(), Ok(free));
    }

    #[test]
    fn empty_write_is_a_no_op() {
        let mut fs = mounted(20);
        let inumber = fs.create().unwrap();
        assert_eq!(fs.write(inumber, &[], 0), Ok(0));
        assert_eq!(fs.stat(inumber), Ok(Inode::new_file()));
    }
}
