//! 目录项查找
//!
//! 索引目录先走 HTree；索引损坏或格式不支持时退回逐块线性扫描。
//! `.` 和 `..` 总是线性扫描（它们位于根块的伪目录项中，不参与哈希）。

use crate::{
    block::{BlockBuf, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::{Ext4Volume, FileNode, FsConfig},
    types::InodeFlags,
};
use log::*;

use super::scan::{DirBlockScanner, DirEntryRef, DirSearch, LinearScanner};

/// 找到的目录项，连同它所在的目录块
///
/// 目录块缓冲区在 `DirMatch` 被丢弃前一直有效。
#[derive(Debug)]
pub struct DirMatch {
    entry: DirEntryRef,
    block: BlockBuf,
    logical_block: u32,
    offset: u64,
}

impl DirMatch {
    pub(crate) fn new(entry: DirEntryRef, block: BlockBuf, logical_block: u32, offset: u64) -> Self {
        Self {
            entry,
            block,
            logical_block,
            offset,
        }
    }

    /// 目录项
    pub fn entry(&self) -> &DirEntryRef {
        &self.entry
    }

    /// 目录项指向的 inode 号
    pub fn inode(&self) -> u32 {
        self.entry.inode
    }

    /// 文件类型字节
    pub fn file_type(&self) -> u8 {
        self.entry.file_type
    }

    /// 名称
    pub fn name(&self) -> &[u8] {
        self.entry.name(self.block.data())
    }

    /// 所在目录块的逻辑块号
    pub fn logical_block(&self) -> u32 {
        self.logical_block
    }

    /// 目录项在目录内的字节偏移
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 所在的目录块
    pub fn block(&self) -> &BlockBuf {
        &self.block
    }

    /// 释放目录块
    pub fn release(self) {}
}

/// 目录是否使用 HTree 索引
///
/// 需要文件系统开启 `dir_index` 特性，且 inode 设置了 `INDEX` 标志。
pub fn is_indexed(config: &FsConfig, dir: &FileNode) -> bool {
    config.has_dir_index() && dir.flags().contains(InodeFlags::INDEX)
}

fn is_dot_entry(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

impl<D: BlockDevice> Ext4Volume<D> {
    /// 在目录 `dir` 中查找 `name`
    ///
    /// 未找到返回 `Ok(None)`。
    pub fn find_entry(&mut self, dir: &mut FileNode, name: &[u8]) -> Result<Option<DirMatch>> {
        let mut search = DirSearch::new(name.len());
        self.find_entry_with(dir, name, &LinearScanner, &mut search)
    }

    /// 使用指定扫描器查找，`search` 返回插入槽位等扫描记录
    ///
    /// # 错误
    ///
    /// - `InvalidInput` - 名称为空或超过 255 字节，或 `dir` 不是目录
    /// - `Io` - 读取目录块失败（不会被线性扫描掩盖）
    /// - `Corrupted` - 目录中有空洞或目录项损坏
    pub fn find_entry_with<S: DirBlockScanner>(
        &mut self,
        dir: &mut FileNode,
        name: &[u8],
        scanner: &S,
        search: &mut DirSearch,
    ) -> Result<Option<DirMatch>> {
        if name.is_empty() || name.len() > EXT4_NAME_MAX {
            return Err(Error::new(ErrorKind::InvalidInput, "Name length must be 1-255"));
        }
        if !dir.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }

        if is_indexed(self.config(), dir) && !is_dot_entry(name) {
            match self.htree().lookup(dir, name, scanner, search) {
                Ok(found) => return Ok(found),
                Err(e) if e.is_format_problem() => {
                    warn!(
                        "[DIR] inode {}: HTree lookup failed ({}), falling back to linear scan",
                        dir.ino(),
                        e
                    );
                    *search = DirSearch::new(name.len());
                }
                Err(e) => return Err(e),
            }
        }

        self.linear_lookup(dir, name, scanner, search)
    }

    fn linear_lookup<S: DirBlockScanner>(
        &mut self,
        dir: &mut FileNode,
        name: &[u8],
        scanner: &S,
        search: &mut DirSearch,
    ) -> Result<Option<DirMatch>> {
        let block_size = self.block_size() as u64;
        let blocks = dir.block_count(self.block_size()).min(u32::MAX as u64 + 1);

        for lbn in 0..blocks {
            let logical_block = lbn as u32;
            let buf = self.read_dir_block(dir, logical_block)?;
            search.reset_for_block(lbn * block_size);
            if let Some(entry) = scanner.scan(buf.data(), name, search)? {
                trace!("[DIR] inode {}: linear hit in block {}", dir.ino(), logical_block);
                return Ok(Some(DirMatch::new(entry, buf, logical_block, search.offset)));
            }
        }

        trace!("[DIR] inode {}: {} blocks scanned, no match", dir.ino(), blocks);
        Ok(None)
    }
}
