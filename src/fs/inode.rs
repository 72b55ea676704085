//! 查找路径使用的 inode 视图

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::extent::ExtentCache;
use crate::types::InodeFlags;
use byteorder::{ByteOrder, LittleEndian};

/// 磁盘 inode 中 i_mode 的偏移
const INODE_MODE_OFFSET: usize = 0;
/// i_size_lo
const INODE_SIZE_LO_OFFSET: usize = 4;
/// i_flags
const INODE_FLAGS_OFFSET: usize = 32;
/// i_block
const INODE_BLOCK_OFFSET: usize = 40;
/// i_size_high
const INODE_SIZE_HIGH_OFFSET: usize = 108;
/// 老版本 inode 的大小
const INODE_GOOD_OLD_SIZE: usize = 128;

/// 文件节点
///
/// 持有查找所需的 inode 字段，以及该文件的单槽 extent 缓存。
/// 缓存通过 `&mut FileNode` 修改，同一时刻只有一个查找者。
#[derive(Debug, Clone)]
pub struct FileNode {
    ino: u32,
    mode: u16,
    flags: InodeFlags,
    size: u64,
    block_area: [u8; EXT4_INODE_BLOCK_AREA_SIZE],
    ext_cache: ExtentCache,
}

impl FileNode {
    /// 由字段构造
    pub fn new(
        ino: u32,
        mode: u16,
        flags: InodeFlags,
        size: u64,
        block_area: [u8; EXT4_INODE_BLOCK_AREA_SIZE],
    ) -> Self {
        Self {
            ino,
            mode,
            flags,
            size,
            block_area,
            ext_cache: ExtentCache::new(),
        }
    }

    /// 从磁盘 inode 记录解析
    ///
    /// 只读取 i_mode、i_size、i_flags 和 i_block。
    pub fn from_raw(ino: u32, raw: &[u8]) -> Result<Self> {
        if raw.len() < INODE_GOOD_OLD_SIZE {
            return Err(Error::new(ErrorKind::InvalidInput, "Inode record too short"));
        }

        let mode = LittleEndian::read_u16(&raw[INODE_MODE_OFFSET..]);
        let size_lo = LittleEndian::read_u32(&raw[INODE_SIZE_LO_OFFSET..]) as u64;
        let size_hi = LittleEndian::read_u32(&raw[INODE_SIZE_HIGH_OFFSET..]) as u64;
        let flags = InodeFlags::from_bits_truncate(LittleEndian::read_u32(&raw[INODE_FLAGS_OFFSET..]));

        let mut block_area = [0u8; EXT4_INODE_BLOCK_AREA_SIZE];
        block_area.copy_from_slice(
            &raw[INODE_BLOCK_OFFSET..INODE_BLOCK_OFFSET + EXT4_INODE_BLOCK_AREA_SIZE],
        );

        Ok(Self::new(ino, mode, flags, (size_hi << 32) | size_lo, block_area))
    }

    /// inode 号
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// i_mode
    pub fn mode(&self) -> u16 {
        self.mode
    }

    /// inode 标志
    pub fn flags(&self) -> InodeFlags {
        self.flags
    }

    /// 文件大小（字节）
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 是否是目录
    pub fn is_dir(&self) -> bool {
        self.mode & EXT4_INODE_MODE_TYPE_MASK == EXT4_INODE_MODE_DIRECTORY
    }

    /// 是否使用 extent 映射
    pub fn uses_extents(&self) -> bool {
        self.flags.contains(InodeFlags::EXTENTS)
    }

    /// i_block 区（60 字节），extent 树根或块指针
    pub fn block_area(&self) -> &[u8; EXT4_INODE_BLOCK_AREA_SIZE] {
        &self.block_area
    }

    /// 第 `index` 个块指针（0..15）
    pub fn block_pointer(&self, index: usize) -> u32 {
        if index >= EXT4_INODE_BLOCKS {
            return 0;
        }
        LittleEndian::read_u32(&self.block_area[index * 4..])
    }

    /// 文件末尾所在的逻辑块号（`size >> log2(block_size)`）
    pub fn last_logical_block(&self, block_size: u32) -> u32 {
        let bits = block_size.trailing_zeros();
        u32::try_from(self.size >> bits).unwrap_or(u32::MAX)
    }

    /// 目录块数（向上取整）
    pub fn block_count(&self, block_size: u32) -> u64 {
        self.size.div_ceil(block_size as u64)
    }

    /// extent 缓存
    pub fn extent_cache(&self) -> &ExtentCache {
        &self.ext_cache
    }

    /// extent 缓存（可变）
    pub fn extent_cache_mut(&mut self) -> &mut ExtentCache {
        &mut self.ext_cache
    }
}
