//! 测试工具：内存块设备和磁盘结构构造器

use crate::block::BlockDevice;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::fs::FileNode;
use crate::types::InodeFlags;
use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

/// 内存块设备
pub(crate) struct MockDevice {
    pub block_size: u32,
    pub sector_size: u32,
    pub total_blocks: u64,
    pub storage: Vec<u8>,
    failing: BTreeSet<u64>,
}

impl MockDevice {
    pub fn new(total_blocks: u64) -> Self {
        Self::with_block_size(total_blocks, EXT4_DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(total_blocks: u64, block_size: u32) -> Self {
        Self {
            block_size,
            sector_size: EXT4_DEFAULT_SECTOR_SIZE,
            total_blocks,
            storage: vec![0u8; (total_blocks * block_size as u64) as usize],
            failing: BTreeSet::new(),
        }
    }

    /// 读取该块时返回 I/O 错误
    pub fn fail_block(&mut self, block: u64) {
        self.failing.insert(block);
    }

    pub fn block_mut(&mut self, block: u64) -> &mut [u8] {
        let bs = self.block_size as usize;
        let start = block as usize * bs;
        &mut self.storage[start..start + bs]
    }

    pub fn fill_block(&mut self, block: u64, byte: u8) {
        self.block_mut(block).fill(byte);
    }

    pub fn write_block(&mut self, block: u64, data: &[u8]) {
        self.block_mut(block)[..data.len()].copy_from_slice(data);
    }
}

impl BlockDevice for MockDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let start = (lba * self.sector_size as u64) as usize;
        let len = (count * self.sector_size) as usize;
        if start + len > self.storage.len() {
            return Err(Error::new(ErrorKind::Io, "Read beyond mock device"));
        }

        let bs = self.block_size as usize;
        let first = start / bs;
        let last = (start + len - 1) / bs;
        if (first..=last).any(|b| self.failing.contains(&(b as u64))) {
            return Err(Error::new(ErrorKind::Io, "Injected read failure"));
        }

        buf[..len].copy_from_slice(&self.storage[start..start + len]);
        Ok(len)
    }
}

//=============================================================================
// Extent 树构造
//=============================================================================

fn write_extent_header(buf: &mut [u8], entries: u16, capacity: u16, depth: u16) {
    buf[0..2].copy_from_slice(&EXT4_EXTENT_MAGIC.to_le_bytes());
    buf[2..4].copy_from_slice(&entries.to_le_bytes());
    buf[4..6].copy_from_slice(&capacity.to_le_bytes());
    buf[6..8].copy_from_slice(&depth.to_le_bytes());
    buf[8..12].fill(0);
}

/// 写叶子节点，extent 为 `(逻辑起点, 长度, 物理起点)`
pub(crate) fn write_leaf(buf: &mut [u8], extents: &[(u32, u16, u64)]) {
    let capacity = ((buf.len() - EXT4_EXTENT_HEADER_SIZE) / EXT4_EXTENT_ENTRY_SIZE) as u16;
    write_extent_header(buf, extents.len() as u16, capacity, 0);
    for (i, &(lblk, len, pblk)) in extents.iter().enumerate() {
        let off = EXT4_EXTENT_HEADER_SIZE + i * EXT4_EXTENT_ENTRY_SIZE;
        let rec = &mut buf[off..off + EXT4_EXTENT_ENTRY_SIZE];
        rec[0..4].copy_from_slice(&lblk.to_le_bytes());
        rec[4..6].copy_from_slice(&len.to_le_bytes());
        rec[6..8].copy_from_slice(&((pblk >> 32) as u16).to_le_bytes());
        rec[8..12].copy_from_slice(&(pblk as u32).to_le_bytes());
    }
}

/// 写索引节点，条目为 `(逻辑起点, 子节点块号)`
pub(crate) fn write_index(buf: &mut [u8], depth: u16, entries: &[(u32, u64)]) {
    let capacity = ((buf.len() - EXT4_EXTENT_HEADER_SIZE) / EXT4_EXTENT_ENTRY_SIZE) as u16;
    write_extent_header(buf, entries.len() as u16, capacity, depth);
    for (i, &(lblk, child)) in entries.iter().enumerate() {
        let off = EXT4_EXTENT_HEADER_SIZE + i * EXT4_EXTENT_ENTRY_SIZE;
        let rec = &mut buf[off..off + EXT4_EXTENT_ENTRY_SIZE];
        rec[0..4].copy_from_slice(&lblk.to_le_bytes());
        rec[4..8].copy_from_slice(&(child as u32).to_le_bytes());
        rec[8..10].copy_from_slice(&((child >> 32) as u16).to_le_bytes());
        rec[10..12].fill(0);
    }
}

pub(crate) fn root_leaf(extents: &[(u32, u16, u64)]) -> [u8; EXT4_INODE_BLOCK_AREA_SIZE] {
    let mut area = [0u8; EXT4_INODE_BLOCK_AREA_SIZE];
    write_leaf(&mut area, extents);
    area
}

pub(crate) fn root_index(depth: u16, entries: &[(u32, u64)]) -> [u8; EXT4_INODE_BLOCK_AREA_SIZE] {
    let mut area = [0u8; EXT4_INODE_BLOCK_AREA_SIZE];
    write_index(&mut area, depth, entries);
    area
}

/// extent 映射的普通文件
pub(crate) fn extent_file(size: u64, root: [u8; EXT4_INODE_BLOCK_AREA_SIZE]) -> FileNode {
    FileNode::new(12, EXT4_INODE_MODE_FILE | 0o644, InodeFlags::EXTENTS, size, root)
}

/// 目录块连续存放在 `first_physical` 起的 `blocks` 个块中的索引目录
pub(crate) fn indexed_dir(first_physical: u64, blocks: u16, block_size: u32) -> FileNode {
    FileNode::new(
        2,
        EXT4_INODE_MODE_DIRECTORY | 0o755,
        InodeFlags::EXTENTS | InodeFlags::INDEX,
        blocks as u64 * block_size as u64,
        root_leaf(&[(0, blocks, first_physical)]),
    )
}

//=============================================================================
// 目录块构造
//=============================================================================

fn put_dirent(buf: &mut [u8], off: usize, ino: u32, rec_len: u16, name: &[u8]) {
    buf[off..off + 4].copy_from_slice(&ino.to_le_bytes());
    buf[off + 4..off + 6].copy_from_slice(&rec_len.to_le_bytes());
    buf[off + 6] = name.len() as u8;
    buf[off + 7] = 0;
    buf[off + 8..off + 8 + name.len()].copy_from_slice(name);
}

/// 由 `(inode, 名称)` 组成的目录块，最后一项占满剩余空间
pub(crate) fn dirent_block(block_size: u32, entries: &[(u32, &str)]) -> Vec<u8> {
    let mut buf = vec![0u8; block_size as usize];
    let mut off = 0;
    for (i, &(ino, name)) in entries.iter().enumerate() {
        let rec_len = if i + 1 == entries.len() {
            block_size as usize - off
        } else {
            dir_rec_len(name.len())
        };
        put_dirent(&mut buf, off, ino, rec_len as u16, name.as_bytes());
        off += rec_len;
    }
    if entries.is_empty() {
        put_dirent(&mut buf, 0, 0, block_size as u16, b"");
    }
    buf
}

/// HTree 根块的默认 limit
pub(crate) fn root_limit(block_size: u32) -> u16 {
    ((block_size as usize - EXT4_HTREE_ROOT_INFO_OFFSET - 8) / EXT4_HTREE_ENTRY_SIZE) as u16
}

fn put_htree_entries(buf: &mut [u8], off: usize, limit: u16, entries: &[(u32, u32)]) {
    for (i, &(hash, block)) in entries.iter().enumerate() {
        let at = off + i * EXT4_HTREE_ENTRY_SIZE;
        if i == 0 {
            buf[at..at + 2].copy_from_slice(&limit.to_le_bytes());
            buf[at + 2..at + 4].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        } else {
            buf[at..at + 4].copy_from_slice(&hash.to_le_bytes());
        }
        buf[at + 4..at + 8].copy_from_slice(&block.to_le_bytes());
    }
}

/// HTree 根块，条目为 `(hash, 目录逻辑块)`，0 号条目的 hash 被忽略
pub(crate) fn htree_root(
    block_size: u32,
    hash_version: u8,
    levels: u8,
    entries: &[(u32, u32)],
) -> Vec<u8> {
    let mut buf = vec![0u8; block_size as usize];
    put_dirent(&mut buf, 0, 2, 12, b".");
    put_dirent(&mut buf, 12, 2, (block_size - 12) as u16, b"..");
    let info = EXT4_HTREE_ROOT_INFO_OFFSET;
    buf[info + 4] = hash_version;
    buf[info + 5] = 8;
    buf[info + 6] = levels;
    put_htree_entries(&mut buf, info + 8, root_limit(block_size), entries);
    buf
}

/// HTree 中间索引块
pub(crate) fn htree_node(block_size: u32, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut buf = vec![0u8; block_size as usize];
    put_dirent(&mut buf, 0, 0, block_size as u16, b"");
    let limit = ((block_size as usize - EXT4_HTREE_NODE_ENTRIES_OFFSET) / EXT4_HTREE_ENTRY_SIZE) as u16;
    put_htree_entries(&mut buf, EXT4_HTREE_NODE_ENTRIES_OFFSET, limit, entries);
    buf
}
