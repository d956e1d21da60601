use thiserror::Error;

/// Every way a filesystem operation can be refused.
///
/// Reading at or past end of file is not an error; it reads zero bytes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("filesystem is already mounted")]
    AlreadyMounted,
    #[error("filesystem is not mounted")]
    NotMounted,
    #[error("invalid magic number {0:#010x}")]
    InvalidMagic(u32),
    #[error("invalid filesystem geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("inode number {0} is out of range")]
    InvalidInodeNumber(u32),
    #[error("inode {0} is not allocated")]
    InodeNotAllocated(u32),
    #[error("no free inode left")]
    NoFreeInode,
    #[error("no free block left")]
    NoFreeBlock,
    #[error("offset {0} is past the maximum file size")]
    FileTooLarge(u32),
}

pub type Result<T> = core::result::Result<T, FsError>;
