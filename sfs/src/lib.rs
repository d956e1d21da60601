//! SimpleFS: a small inode filesystem over a fixed-size block device.
//!
//! Block 0 holds the superblock, the next tenth of the device holds the
//! inode table, and the rest is data. Each inode addresses five blocks
//! directly plus one indirect block of 1024 more pointers.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bitmap;
pub mod block_dev;
pub mod constant;
mod data;
pub mod error;
mod inode;
pub mod layout;
#[cfg(feature = "std")]
pub mod logging;
pub mod report;
pub mod sfs;

pub use block_dev::{BlockDevice, MemDisk};
#[cfg(feature = "std")]
pub use block_dev::FileDisk;
pub use constant::{BLOCK_SIZE, MAX_FILE_SIZE};
pub use error::{FsError, Result};
pub use layout::{Inode, SuperBlock};
pub use report::{DebugReport, InodeSummary};
pub use sfs::SimpleFs;
