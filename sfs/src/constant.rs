use core::mem::size_of;

pub type BlockAddr = u32;
pub type Block = [u8; BLOCK_SIZE];
/// (inode table block, slot inside that block)
pub type InodeAddr = (BlockAddr, usize);

pub fn inode2addr(inumber: u32) -> InodeAddr {
    (
        1 + inumber / INODES_PER_BLOCK as u32,
        inumber as usize % INODES_PER_BLOCK,
    )
}

pub fn addr2inode((block_addr, slot): InodeAddr) -> u32 {
    (block_addr - 1) * INODES_PER_BLOCK as u32 + slot as u32
}

pub const NULL: BlockAddr = 0;
pub const SUPER: BlockAddr = 0;
pub const MAGIC: u32 = 0xf0f0_3410;
pub const BLOCK_SIZE: usize = 4096;

pub const INODE_SIZE: usize = 32;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const POINTERS_PER_INODE: usize = 5;
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<BlockAddr>();

/// Logical blocks one inode can address: its direct slots plus one indirect table.
pub const MAX_FILE_BLOCKS: usize = POINTERS_PER_INODE + POINTERS_PER_BLOCK;
pub const MAX_FILE_SIZE: usize = MAX_FILE_BLOCKS * BLOCK_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_addressing_round_trips_across_table_blocks() {
        assert_eq!(inode2addr(0), (1, 0));
        assert_eq!(inode2addr(127), (1, 127));
        assert_eq!(inode2addr(128), (2, 0));
        assert_eq!(inode2addr(300), (3, 44));
        for inumber in [0, 1, 127, 128, 129, 1279] {
            assert_eq!(addr2inode(inode2addr(inumber)), inumber);
        }
    }

    #[test]
    fn geometry_constants() {
        assert_eq!(INODES_PER_BLOCK, 128);
        assert_eq!(POINTERS_PER_BLOCK, 1024);
        assert_eq!(MAX_FILE_SIZE, (5 + 1024) * 4096);
    }
}
