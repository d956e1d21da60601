use alloc::{sync::Arc, vec::Vec};
use core::fmt;

use crate::{
    block_dev::BlockDevice,
    constant::BlockAddr,
    inode::for_each_inode,
    layout::{IndexBlock, SuperBlock},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeSummary {
    pub inumber: u32,
    pub size: u32,
    /// Non-null direct pointers.
    pub direct: Vec<BlockAddr>,
    /// The indirect block and its non-null entries.
    pub indirect: Option<(BlockAddr, Vec<BlockAddr>)>,
}

/// What `debug` found on the device, printable in the classic layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugReport {
    pub superblock: SuperBlock,
    pub inodes: Vec<InodeSummary>,
}

impl DebugReport {
    pub(crate) fn collect(device: &Arc<dyn BlockDevice>) -> Self {
        let superblock = SuperBlock::load(device);
        let mut inodes = Vec::new();
        // Garbage counts could point the scan anywhere on the device.
        if superblock.valid() && superblock.check_geometry(device.block_count()).is_ok() {
            for_each_inode(device, &superblock, |inumber, inode| {
                let indirect = superblock.is_data_block(inode.indirect).then(|| {
                    let entries = IndexBlock::load(device, inode.indirect).used().collect();
                    (inode.indirect, entries)
                });
                inodes.push(InodeSummary {
                    inumber,
                    size: inode.size,
                    direct: inode.direct_blocks().collect(),
                    indirect,
                });
            });
        }
        Self { superblock, inodes }
    }
}

impl fmt::Display for DebugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sb = &self.superblock;
        writeln!(f, "superblock:")?;
        if sb.valid() {
            writeln!(f, "    magic number is valid")?;
        } else {
            writeln!(f, "    magic number is not valid")?;
        }
        writeln!(f, "    {} blocks on disk", sb.nblocks)?;
        writeln!(f, "    {} blocks for inodes", sb.ninodeblocks)?;
        writeln!(f, "    {} inodes total", sb.ninodes)?;

        for inode in &self.inodes {
            writeln!(f, "inode {}:", inode.inumber)?;
            writeln!(f, "    size: {} bytes", inode.size)?;
            write!(f, "    direct blocks:")?;
            for addr in &inode.direct {
                write!(f, " {addr}")?;
            }
            writeln!(f)?;
            if let Some((addr, entries)) = &inode.indirect {
                writeln!(f, "    indirect block: {addr}")?;
                write!(f, "    indirect data blocks:")?;
                for entry in entries {
                    write!(f, " {entry}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
