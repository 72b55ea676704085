//! 磁盘格式记录
//!
//! 这个模块把 extent 树和 HTree 的磁盘记录解码为普通的 Rust 值。
//!
//! ## 设计原则
//!
//! 1. **不做指针转换** - 所有记录通过 `byteorder` 从字节切片按小端解码
//! 2. **边界检查** - 切片长度不足时返回 `Corrupted`，不会越界读取
//! 3. **标志位** - inode 标志与特性标志使用 `bitflags` 类型

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

bitflags! {
    /// inode 标志（仅查找路径关心的位）
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InodeFlags: u32 {
        /// 目录使用 HTree 索引
        const INDEX = EXT4_INODE_FLAG_INDEX;
        /// 文件使用 extent 映射
        const EXTENTS = EXT4_INODE_FLAG_EXTENTS;
    }
}

bitflags! {
    /// 兼容特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompatFeatures: u32 {
        /// 目录索引（HTree）
        const DIR_INDEX = EXT4_FEATURE_COMPAT_DIR_INDEX;
    }
}

bitflags! {
    /// 只读兼容特性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RoCompatFeatures: u32 {
        /// 元数据校验和
        const METADATA_CSUM = EXT4_FEATURE_RO_COMPAT_METADATA_CSUM;
    }
}

bitflags! {
    /// Superblock 标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SuperFlags: u32 {
        /// 目录哈希按有符号字节计算
        const SIGNED_HASH = EXT4_SUPERBLOCK_FLAGS_SIGNED_HASH;
        /// 目录哈希按无符号字节计算
        const UNSIGNED_HASH = EXT4_SUPERBLOCK_FLAGS_UNSIGNED_HASH;
    }
}

fn need(data: &[u8], len: usize, message: &'static str) -> Result<()> {
    if data.len() < len {
        return Err(Error::new(ErrorKind::Corrupted, message));
    }
    Ok(())
}

//=============================================================================
// Extent 树
//=============================================================================

/// Extent 树节点头部
///
/// 磁盘布局：`magic: u16, entries: u16, max: u16, depth: u16, generation: u32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtentHeader {
    /// 魔数，必须为 0xF30A
    pub magic: u16,
    /// 有效条目数
    pub entry_count: u16,
    /// 节点容量
    pub capacity: u16,
    /// 节点深度，0 表示叶子
    pub depth: u16,
    /// generation
    pub generation: u32,
}

impl ExtentHeader {
    /// 从节点起始处解码头部
    pub fn parse(data: &[u8]) -> Result<Self> {
        need(data, EXT4_EXTENT_HEADER_SIZE, "Extent header truncated")?;
        Ok(Self {
            magic: LittleEndian::read_u16(&data[0..2]),
            entry_count: LittleEndian::read_u16(&data[2..4]),
            capacity: LittleEndian::read_u16(&data[4..6]),
            depth: LittleEndian::read_u16(&data[6..8]),
            generation: LittleEndian::read_u32(&data[8..12]),
        })
    }

    /// 检查魔数是否有效
    pub fn is_valid(&self) -> bool {
        self.magic == EXT4_EXTENT_MAGIC
    }

    /// 是否是叶子节点
    pub fn is_leaf(&self) -> bool {
        self.depth == 0
    }
}

/// 一段连续映射（或合成的空洞）
///
/// 磁盘上长度为 `u16`，物理块号拆成低 32 位与高 16 位。内存中长度放宽为
/// `u32`，这样合成的空洞不会被截断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    /// 起始逻辑块
    pub logical_start: u32,
    /// 块数
    pub length: u32,
    /// 起始物理块（48 位），空洞为 0
    pub physical_start: u64,
}

impl Extent {
    /// 构造 extent
    pub const fn new(logical_start: u32, length: u32, physical_start: u64) -> Self {
        Self {
            logical_start,
            length,
            physical_start,
        }
    }

    /// 构造空洞（物理起点为 0）
    pub const fn gap(logical_start: u32, length: u32) -> Self {
        Self::new(logical_start, length, 0)
    }

    /// 解码磁盘上的 12 字节 extent 记录
    ///
    /// 布局：`block: u32, len: u16, start_hi: u16, start_lo: u32`
    pub fn parse(data: &[u8]) -> Result<Self> {
        need(data, EXT4_EXTENT_ENTRY_SIZE, "Extent record truncated")?;
        let start_hi = LittleEndian::read_u16(&data[6..8]) as u64;
        let start_lo = LittleEndian::read_u32(&data[8..12]) as u64;
        Ok(Self {
            logical_start: LittleEndian::read_u32(&data[0..4]),
            length: LittleEndian::read_u16(&data[4..6]) as u32,
            physical_start: (start_hi << 32) | start_lo,
        })
    }

    /// 结束逻辑块（不含）
    pub fn end(&self) -> u64 {
        self.logical_start as u64 + self.length as u64
    }

    /// 逻辑块是否落在本 extent 内
    pub fn contains(&self, logical_block: u32) -> bool {
        logical_block >= self.logical_start && (logical_block as u64) < self.end()
    }

    /// 逻辑块对应的物理块（不检查范围）
    pub fn physical_for(&self, logical_block: u32) -> u64 {
        self.physical_start + (logical_block - self.logical_start) as u64
    }
}

/// Extent 索引条目
///
/// 布局：`block: u32, leaf_lo: u32, leaf_hi: u16, unused: u16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtentIndex {
    /// 子树覆盖的起始逻辑块
    pub logical_start: u32,
    /// 子节点物理块号（48 位）
    pub child_block: u64,
}

impl ExtentIndex {
    /// 解码磁盘上的 12 字节索引记录
    pub fn parse(data: &[u8]) -> Result<Self> {
        need(data, EXT4_EXTENT_ENTRY_SIZE, "Extent index record truncated")?;
        let leaf_lo = LittleEndian::read_u32(&data[4..8]) as u64;
        let leaf_hi = LittleEndian::read_u16(&data[8..10]) as u64;
        Ok(Self {
            logical_start: LittleEndian::read_u32(&data[0..4]),
            child_block: (leaf_hi << 32) | leaf_lo,
        })
    }
}

//=============================================================================
// HTree
//=============================================================================

/// HTree 索引条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HTreeEntry {
    /// 子树最小哈希
    pub hash: u32,
    /// 目录内逻辑块号（只用低 24 位）
    pub block: u32,
}

impl HTreeEntry {
    /// 解码 8 字节条目
    pub fn parse(data: &[u8]) -> Result<Self> {
        need(data, EXT4_HTREE_ENTRY_SIZE, "HTree entry truncated")?;
        Ok(Self {
            hash: LittleEndian::read_u32(&data[0..4]),
            block: LittleEndian::read_u32(&data[4..8]) & EXT4_HTREE_BLOCK_MASK,
        })
    }
}

/// HTree 条目数组的计数头（覆盖 0 号条目的 hash 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HTreeCount {
    /// 最大条目数（含 0 号条目）
    pub limit: u16,
    /// 当前条目数（含 0 号条目）
    pub count: u16,
}

impl HTreeCount {
    /// 解码计数头
    pub fn parse(data: &[u8]) -> Result<Self> {
        need(data, 4, "HTree count header truncated")?;
        Ok(Self {
            limit: LittleEndian::read_u16(&data[0..2]),
            count: LittleEndian::read_u16(&data[2..4]),
        })
    }
}

/// HTree 根信息
///
/// 布局：`reserved: u32, hash_version: u8, info_len: u8, indirect_levels: u8, unused_flags: u8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HTreeRootInfo {
    /// 哈希算法
    pub hash_version: u8,
    /// 根信息长度（通常为 8）
    pub info_len: u8,
    /// 根以下的索引层数（0 或 1）
    pub indirect_levels: u8,
}

impl HTreeRootInfo {
    /// 从根块解码根信息
    pub fn parse(root_block: &[u8]) -> Result<Self> {
        let off = EXT4_HTREE_ROOT_INFO_OFFSET;
        need(root_block, off + 8, "HTree root info truncated")?;
        Ok(Self {
            hash_version: root_block[off + 4],
            info_len: root_block[off + 5],
            indirect_levels: root_block[off + 6],
        })
    }
}
