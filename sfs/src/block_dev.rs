use crate::constant::{Block, BlockAddr, BLOCK_SIZE};
use alloc::{vec, vec::Vec};
use core::any::Any;
use spin::Mutex;

/// Fixed-size block storage the filesystem lives on.
///
/// Buffers passed in are exactly [`BLOCK_SIZE`] bytes. Addresses at or past
/// `block_count()` are the caller's bug; implementations may panic on them.
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]);
    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]);
    fn block_count(&self) -> u32;
}

/// A RAM-backed device, zero-filled on creation.
#[derive(Debug)]
pub struct MemDisk(Mutex<Vec<Block>>);

impl MemDisk {
    pub fn new(blocks: u32) -> Self {
        Self(Mutex::new(vec![[0u8; BLOCK_SIZE]; blocks as usize]))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) {
        buf.copy_from_slice(&self.0.lock()[block_addr as usize]);
    }

    fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) {
        self.0.lock()[block_addr as usize].copy_from_slice(buf);
    }

    fn block_count(&self) -> u32 {
        self.0.lock().len() as u32
    }
}

#[cfg(feature = "std")]
pub use self::file_disk::FileDisk;

#[cfg(feature = "std")]
mod file_disk {
    use super::BlockDevice;
    use crate::constant::{BlockAddr, BLOCK_SIZE};
    use std::{
        fs::{File, OpenOptions},
        io::{self, Read, Seek, SeekFrom, Write},
        path::Path,
        sync::Mutex,
    };

    /// A disk image file holding `blocks * BLOCK_SIZE` bytes.
    #[derive(Debug)]
    pub struct FileDisk {
        file: Mutex<File>,
        blocks: u32,
    }

    impl FileDisk {
        /// Opens (creating if needed) the image and sizes it to `blocks` blocks.
        pub fn open(path: impl AsRef<Path>, blocks: u32) -> io::Result<Self> {
            let f = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?;
            f.set_len(BLOCK_SIZE as u64 * blocks as u64)?;
            Ok(Self {
                file: Mutex::new(f),
                blocks,
            })
        }
    }

    impl BlockDevice for FileDisk {
        fn read_block(&self, block_addr: BlockAddr, buf: &mut [u8]) {
            let mut file = self.file.lock().expect("disk image lock poisoned");
            file.seek(SeekFrom::Start(block_addr as u64 * BLOCK_SIZE as u64))
                .expect("Error when seeking!");
            file.read_exact(buf).expect("Not a complete block!");
        }

        fn write_block(&self, block_addr: BlockAddr, buf: &[u8]) {
            let mut file = self.file.lock().expect("disk image lock poisoned");
            file.seek(SeekFrom::Start(block_addr as u64 * BLOCK_SIZE as u64))
                .expect("Error when seeking!");
            file.write_all(buf).expect("Not a complete block!");
        }

        fn block_count(&self) -> u32 {
            self.blocks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_disk_starts_zeroed_and_keeps_writes() {
        let disk = MemDisk::new(4);
        assert_eq!(disk.block_count(), 4);

        let mut buf = [0xffu8; BLOCK_SIZE];
        disk.read_block(3, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));

        buf[0] = 7;
        buf[BLOCK_SIZE - 1] = 9;
        disk.write_block(2, &buf);
        let mut back = [0u8; BLOCK_SIZE];
        disk.read_block(2, &mut back);
        assert_eq!(back[0], 7);
        assert_eq!(back[BLOCK_SIZE - 1], 9);
    }
}
