use alloc::sync::Arc;
use log::debug;

use crate::{
    block_dev::BlockDevice,
    constant::{addr2inode, inode2addr, BLOCK_SIZE, INODES_PER_BLOCK},
    error::{FsError, Result},
    layout::{IndexBlock, Inode, SuperBlock},
    sfs::SimpleFs,
};

pub(crate) fn read_inode<V>(
    device: &Arc<dyn BlockDevice>,
    inumber: u32,
    f: impl FnOnce(&Inode) -> V,
) -> V {
    let (block_addr, slot) = inode2addr(inumber);
    let mut block = [0u8; BLOCK_SIZE];
    device.read_block(block_addr, &mut block);
    f(&Inode::read_slot(&block, slot))
}

/// Read-modify-write of one record; the rest of its table block is untouched.
pub(crate) fn modify_inode<V>(
    device: &Arc<dyn BlockDevice>,
    inumber: u32,
    f: impl FnOnce(&mut Inode) -> V,
) -> V {
    let (block_addr, slot) = inode2addr(inumber);
    let mut block = [0u8; BLOCK_SIZE];
    device.read_block(block_addr, &mut block);
    let mut inode = Inode::read_slot(&block, slot);
    let v = f(&mut inode);
    inode.write_slot(&mut block, slot);
    device.write_block(block_addr, &block);
    v
}

pub(crate) fn store_inode(device: &Arc<dyn BlockDevice>, inumber: u32, inode: &Inode) {
    modify_inode(device, inumber, |slot| *slot = *inode)
}

/// Visits every valid inode in inumber order, one table block read at a time.
pub(crate) fn for_each_inode(
    device: &Arc<dyn BlockDevice>,
    sb: &SuperBlock,
    mut f: impl FnMut(u32, &Inode),
) {
    let mut block = [0u8; BLOCK_SIZE];
    for block_addr in 1..=sb.ninodeblocks {
        device.read_block(block_addr, &mut block);
        for slot in 0..INODES_PER_BLOCK {
            let inode = Inode::read_slot(&block, slot);
            if inode.valid {
                f(addr2inode((block_addr, slot)), &inode);
            }
        }
    }
}

impl SimpleFs {
    /// Allocates the lowest free inumber above 0 as an empty file.
    pub fn create(&mut self) -> Result<u32> {
        let state = self.mounted()?;
        let mut block = [0u8; BLOCK_SIZE];
        for block_addr in 1..=state.sb.ninodeblocks {
            self.device.read_block(block_addr, &mut block);
            let free_slot = (0..INODES_PER_BLOCK).find(|&slot| {
                let inumber = addr2inode((block_addr, slot));
                inumber != 0
                    && inumber < state.sb.ninodes
                    && !Inode::read_slot(&block, slot).valid
            });
            if let Some(slot) = free_slot {
                // A reused slot may still name blocks released by delete; the
                // fresh record disowns them.
                Inode::new_file().write_slot(&mut block, slot);
                self.device.write_block(block_addr, &block);
                let inumber = addr2inode((block_addr, slot));
                debug!("create inode {inumber}");
                return Ok(inumber);
            }
        }
        Err(FsError::NoFreeInode)
    }

    /// Invalidates the inode and returns all of its blocks to the bitmap.
    /// Block contents are left as they are.
    pub fn delete(&mut self, inumber: u32) -> Result<()> {
        let state = self.state.as_mut().ok_or(FsError::NotMounted)?;
        let device = &self.device;
        let inode = state.valid_inode(device, inumber)?;

        for addr in inode.direct_blocks() {
            state.release(addr);
        }
        if state.sb.is_data_block(inode.indirect) {
            for addr in IndexBlock::load(device, inode.indirect).used() {
                state.release(addr);
            }
            state.release(inode.indirect);
            IndexBlock::empty().store(device, inode.indirect);
        }

        store_inode(device, inumber, &Inode::default());
        debug!("delete inode {inumber}");
        Ok(())
    }

    /// Logical size in bytes, as stored in the inode.
    pub fn getsize(&self, inumber: u32) -> Result<u32> {
        let inode = self.mounted()?.valid_inode(&self.device, inumber)?;
        Ok(inode.size)
    }

    /// The whole inode record, pointers included.
    pub fn stat(&self, inumber: u32) -> Result<Inode> {
        self.mounted()?.valid_inode(&self.device, inumber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_dev::MemDisk;

    fn mounted(blocks: u32) -> SimpleFs {
        let mut fs = SimpleFs::new(Arc::new(MemDisk::new(blocks)));
        fs.format().unwrap();
        fs.mount().unwrap();
        fs
    }

    #[test]
    fn create_skips_inumber_zero_and_reuses_freed_slots() {
        let mut fs = mounted(20);
        assert_eq!(fs.create(), Ok(1));
        assert_eq!(fs.create(), Ok(2));
        assert_eq!(fs.create(), Ok(3));
        fs.delete(2).unwrap();
        assert_eq!(fs.create(), Ok(2));
        assert_eq!(fs.create(), Ok(4));
    }

    #[test]
    fn create_crosses_into_the_second_table_block() {
        let mut fs = mounted(20);
        for expected in 1..128 {
            assert_eq!(fs.create(), Ok(expected));
        }
        assert_eq!(fs.create(), Ok(128));
        assert_eq!(inode2addr(128).0, 2);
        assert_eq!(fs.getsize(128), Ok(0));
    }

    #[test]
    fn modify_inode_leaves_neighbours_alone() {
        let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(4));
        store_inode(&device, 5, &Inode::new_file());
        modify_inode(&device, 6, |inode| {
            inode.valid = true;
            inode.size = 77;
        });
        assert_eq!(read_inode(&device, 5, |inode| *inode), Inode::new_file());
        assert_eq!(read_inode(&device, 6, |inode| inode.size), 77);
        assert!(!read_inode(&device, 7, |inode| inode.valid));
    }

    #[test]
    fn delete_and_getsize_check_the_inumber() {
        let mut fs = mounted(20);
        let ninodes = fs.superblock().unwrap().ninodes;
        assert_eq!(fs.delete(ninodes), Err(FsError::InvalidInodeNumber(ninodes)));
        assert_eq!(fs.delete(0), Err(FsError::InodeNotAllocated(0)));
        assert_eq!(fs.getsize(ninodes + 5), Err(FsError::InvalidInodeNumber(ninodes + 5)));

        let inumber = fs.create().unwrap();
        fs.delete(inumber).unwrap();
        assert_eq!(fs.delete(inumber), Err(FsError::InodeNotAllocated(inumber)));
        assert_eq!(fs.getsize(inumber), Err(FsError::InodeNotAllocated(inumber)));
    }
}
