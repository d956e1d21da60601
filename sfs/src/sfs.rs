use alloc::sync::Arc;
use log::{debug, info, warn};

use crate::{
    bitmap::Bitmap,
    block_dev::BlockDevice,
    constant::{BlockAddr, BLOCK_SIZE, INODES_PER_BLOCK, NULL},
    error::{FsError, Result},
    inode::{for_each_inode, read_inode},
    layout::{IndexBlock, Inode, SuperBlock},
    report::DebugReport,
};

/// State that only exists while mounted: the superblock read at mount time
/// and the free-space bitmap rebuilt from the inode table.
#[derive(Debug)]
pub(crate) struct MountState {
    pub(crate) sb: SuperBlock,
    pub(crate) free: Bitmap,
}

impl MountState {
    pub(crate) fn check_inumber(&self, inumber: u32) -> Result<()> {
        if inumber < self.sb.ninodes {
            Ok(())
        } else {
            Err(FsError::InvalidInodeNumber(inumber))
        }
    }

    /// Loads inode `inumber`, failing unless it is in range and allocated.
    pub(crate) fn valid_inode(&self, device: &Arc<dyn BlockDevice>, inumber: u32) -> Result<Inode> {
        self.check_inumber(inumber)?;
        let inode = read_inode(device, inumber, |inode| *inode);
        if inode.valid {
            Ok(inode)
        } else {
            Err(FsError::InodeNotAllocated(inumber))
        }
    }

    pub(crate) fn claim(&mut self) -> Option<BlockAddr> {
        let addr = self.free.alloc();
        match addr {
            Some(addr) => debug!("claim block {addr}"),
            None => warn!("no free block left"),
        }
        addr
    }

    pub(crate) fn release(&mut self, addr: BlockAddr) {
        if self.sb.is_data_block(addr) {
            debug!("release block {addr}");
            self.free.release(addr);
        } else {
            warn!("refusing to release block {addr} outside the data region");
        }
    }

    /// Marks a block found during the mount scan.
    fn mark(&mut self, inumber: u32, addr: BlockAddr) -> bool {
        if self.sb.is_data_block(addr) {
            self.free.mark_used(addr);
            true
        } else {
            warn!("inode {inumber} points at block {addr} outside the data region, ignored");
            false
        }
    }
}

/// A filesystem session over one block device.
///
/// Nothing but `format` and `debug` works until `mount` succeeds.
pub struct SimpleFs {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) state: Option<MountState>,
}

impl SimpleFs {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            state: None,
        }
    }

    pub fn device(&self) -> Arc<dyn BlockDevice> {
        Arc::clone(&self.device)
    }

    pub fn is_mounted(&self) -> bool {
        self.state.is_some()
    }

    /// The superblock read by the last successful mount.
    pub fn superblock(&self) -> Option<&SuperBlock> {
        self.state.as_ref().map(|state| &state.sb)
    }

    pub fn free_blocks(&self) -> Result<u32> {
        Ok(self.mounted()?.free.free_count())
    }

    pub(crate) fn mounted(&self) -> Result<&MountState> {
        self.state.as_ref().ok_or(FsError::NotMounted)
    }

    /// Writes a fresh, empty filesystem over the whole device.
    ///
    /// Data blocks reachable from whatever inode records were on disk before
    /// are zeroed, then the inode table itself.
    pub fn format(&mut self) -> Result<()> {
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }
        let sb = SuperBlock::new(self.device.block_count())?;
        info!(
            "format: {} blocks, {} inode blocks, {} inodes",
            sb.nblocks, sb.ninodeblocks, sb.ninodes
        );
        sb.store(&self.device);

        let zero = [0u8; BLOCK_SIZE];
        let mut table = [0u8; BLOCK_SIZE];
        for table_addr in 1..=sb.ninodeblocks {
            self.device.read_block(table_addr, &mut table);
            for slot in 0..INODES_PER_BLOCK {
                let stale = Inode::read_slot(&table, slot);
                for addr in stale.direct_blocks().filter(|&a| sb.is_data_block(a)) {
                    self.device.write_block(addr, &zero);
                }
                if sb.is_data_block(stale.indirect) {
                    let index = IndexBlock::load(&self.device, stale.indirect);
                    for addr in index.used().filter(|&a| sb.is_data_block(a)) {
                        self.device.write_block(addr, &zero);
                    }
                    self.device.write_block(stale.indirect, &zero);
                }
            }
            self.device.write_block(table_addr, &zero);
        }
        Ok(())
    }

    /// Validates the superblock and rebuilds the free-space bitmap from every
    /// valid inode.
    pub fn mount(&mut self) -> Result<()> {
        if self.is_mounted() {
            return Err(FsError::AlreadyMounted);
        }
        let sb = SuperBlock::load(&self.device);
        if !sb.valid() {
            return Err(FsError::InvalidMagic(sb.magic));
        }
        sb.check_geometry(self.device.block_count())?;

        let mut state = MountState {
            sb,
            free: Bitmap::new(sb.nblocks),
        };
        (0..sb.data_start()).for_each(|addr| state.free.mark_used(addr));

        let device = &self.device;
        for_each_inode(device, &sb, |inumber, inode| {
            for addr in inode.direct_blocks() {
                state.mark(inumber, addr);
            }
            if inode.indirect != NULL && state.mark(inumber, inode.indirect) {
                for addr in IndexBlock::load(device, inode.indirect).used() {
                    state.mark(inumber, addr);
                }
            }
        });

        info!(
            "mount: {} of {} blocks free",
            state.free.free_count(),
            sb.nblocks
        );
        self.state = Some(state);
        Ok(())
    }

    /// Drops the in-memory state. Everything is already on the device.
    pub fn unmount(&mut self) -> Result<()> {
        self.state.take().ok_or(FsError::NotMounted)?;
        info!("unmount");
        Ok(())
    }

    /// Read-only snapshot of the superblock and every valid inode. Works
    /// whether or not the filesystem is mounted.
    pub fn debug(&self) -> DebugReport {
        DebugReport::collect(&self.device)
    }
}
