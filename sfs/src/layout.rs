//! On-disk structures and their byte codecs.
//!
//! Every structure is decoded from and encoded into one canonical
//! [`Block`] buffer; all fields are little-endian 32-bit integers.

use alloc::sync::Arc;

use crate::{
    block_dev::BlockDevice,
    constant::{
        Block, BlockAddr, BLOCK_SIZE, INODES_PER_BLOCK, INODE_SIZE, MAGIC, NULL,
        POINTERS_PER_BLOCK, POINTERS_PER_INODE, SUPER,
    },
    error::{FsError, Result},
};

fn get_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn put_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub nblocks: u32,
    pub ninodeblocks: u32,
    pub ninodes: u32,
}

impl SuperBlock {
    /// Lays out a fresh filesystem over `nblocks` blocks, giving 10% of them
    /// (rounded up) to the inode table.
    pub fn new(nblocks: u32) -> Result<Self> {
        let ninodeblocks = nblocks.div_ceil(10);
        if ninodeblocks >= nblocks {
            return Err(FsError::InvalidGeometry("device too small"));
        }
        let ninodes = ninodeblocks
            .checked_mul(INODES_PER_BLOCK as u32)
            .ok_or(FsError::InvalidGeometry("too many inodes"))?;
        Ok(Self {
            magic: MAGIC,
            nblocks,
            ninodeblocks,
            ninodes,
        })
    }

    pub fn valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// Checks that the counts agree with each other and fit on `device_blocks`.
    pub fn check_geometry(&self, device_blocks: u32) -> Result<()> {
        if self.nblocks > device_blocks {
            Err(FsError::InvalidGeometry("superblock is larger than the device"))
        } else if self.ninodeblocks >= self.nblocks {
            Err(FsError::InvalidGeometry("inode table fills the device"))
        } else if self.ninodeblocks.checked_mul(INODES_PER_BLOCK as u32) != Some(self.ninodes) {
            Err(FsError::InvalidGeometry("inode count does not match inode blocks"))
        } else {
            Ok(())
        }
    }

    /// First block past the inode table.
    pub fn data_start(&self) -> BlockAddr {
        self.ninodeblocks + 1
    }

    /// Whether `addr` may legally appear in an inode or index block.
    pub fn is_data_block(&self, addr: BlockAddr) -> bool {
        addr >= self.data_start() && addr < self.nblocks
    }

    pub fn decode(block: &Block) -> Self {
        Self {
            magic: get_u32(block, 0),
            nblocks: get_u32(block, 4),
            ninodeblocks: get_u32(block, 8),
            ninodes: get_u32(block, 12),
        }
    }

    pub fn encode(&self, block: &mut Block) {
        block.fill(0);
        put_u32(block, 0, self.magic);
        put_u32(block, 4, self.nblocks);
        put_u32(block, 8, self.ninodeblocks);
        put_u32(block, 12, self.ninodes);
    }

    pub fn load(device: &Arc<dyn BlockDevice>) -> Self {
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(SUPER, &mut block);
        Self::decode(&block)
    }

    pub fn store(&self, device: &Arc<dyn BlockDevice>) {
        let mut block = [0u8; BLOCK_SIZE];
        self.encode(&mut block);
        device.write_block(SUPER, &block);
    }
}

/// One 32-byte inode record: `{isvalid, size, direct[5], indirect}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    pub valid: bool,
    pub size: u32,
    pub direct: [BlockAddr; POINTERS_PER_INODE],
    pub indirect: BlockAddr,
}

impl Inode {
    /// A valid, empty file.
    pub fn new_file() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        let mut direct = [NULL; POINTERS_PER_INODE];
        for (i, ptr) in direct.iter_mut().enumerate() {
            *ptr = get_u32(raw, 8 + 4 * i);
        }
        Self {
            valid: get_u32(raw, 0) != 0,
            size: get_u32(raw, 4),
            direct,
            indirect: get_u32(raw, 28),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        put_u32(raw, 0, self.valid as u32);
        put_u32(raw, 4, self.size);
        for (i, &ptr) in self.direct.iter().enumerate() {
            put_u32(raw, 8 + 4 * i, ptr);
        }
        put_u32(raw, 28, self.indirect);
    }

    /// Decodes the record at `slot` of an inode table block.
    pub fn read_slot(block: &Block, slot: usize) -> Self {
        Self::decode(&block[slot * INODE_SIZE..(slot + 1) * INODE_SIZE])
    }

    pub fn write_slot(&self, block: &mut Block, slot: usize) {
        self.encode(&mut block[slot * INODE_SIZE..(slot + 1) * INODE_SIZE]);
    }

    /// Non-null direct pointers in slot order.
    pub fn direct_blocks(&self) -> impl Iterator<Item = BlockAddr> + '_ {
        self.direct.iter().copied().filter(|&addr| addr != NULL)
    }
}

/// The pointer table held in an indirect block.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexBlock(pub [BlockAddr; POINTERS_PER_BLOCK]);

impl IndexBlock {
    pub fn empty() -> Self {
        Self([NULL; POINTERS_PER_BLOCK])
    }

    pub fn decode(block: &Block) -> Self {
        let mut table = [NULL; POINTERS_PER_BLOCK];
        for (i, ptr) in table.iter_mut().enumerate() {
            *ptr = get_u32(block, 4 * i);
        }
        Self(table)
    }

    pub fn encode(&self, block: &mut Block) {
        for (i, &ptr) in self.0.iter().enumerate() {
            put_u32(block, 4 * i, ptr);
        }
    }

    pub fn load(device: &Arc<dyn BlockDevice>, addr: BlockAddr) -> Self {
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(addr, &mut block);
        Self::decode(&block)
    }

    pub fn store(&self, device: &Arc<dyn BlockDevice>, addr: BlockAddr) {
        let mut block = [0u8; BLOCK_SIZE];
        self.encode(&mut block);
        device.write_block(addr, &block);
    }

    /// Non-null entries in table order.
    pub fn used(&self) -> impl Iterator<Item = BlockAddr> + '_ {
        self.0.iter().copied().filter(|&addr| addr != NULL)
    }
}

impl core::fmt::Debug for IndexBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.used()).finish()
    }
}
