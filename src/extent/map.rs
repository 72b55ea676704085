//! 逻辑块到物理块的映射（bmap）
//!
//! 解析顺序：
//! 1. 文件的单槽 extent 缓存
//! 2. extent 树查找，结果写回缓存
//! 3. 根节点不是 extent 头部时，退回间接块映射

use crate::{
    block::{BlockBuf, BlockDevice},
    error::{Error, ErrorKind, Result},
    fs::{Ext4Volume, FileNode},
    indirect::IndirectBlockMapper,
    types::Extent,
};
use log::*;

use super::cache::{CacheKind, CacheLookup};
use super::tree::ExtentMatch;

/// 一次映射的结果：物理块号，以及从该块起连续映射的块数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    /// 物理块号
    pub physical_block: u64,
    /// 连续块数（含本块）
    pub run_length: u32,
}

impl BlockRun {
    fn within(extent: &Extent, logical_block: u32) -> Self {
        Self {
            physical_block: extent.physical_for(logical_block),
            run_length: (extent.end() - logical_block as u64) as u32,
        }
    }
}

impl<D: BlockDevice> Ext4Volume<D> {
    /// 把文件的逻辑块映射到物理块
    ///
    /// 空洞返回 `Ok(None)`。
    pub fn bmap(&mut self, file: &mut FileNode, logical_block: u32) -> Result<Option<BlockRun>> {
        if !file.uses_extents() {
            return self.bmap_indirect(file, logical_block);
        }

        match file.extent_cache().lookup(logical_block) {
            CacheLookup::Mapped(extent) => {
                trace!("[BMAP] inode {} lbn {} cache hit", file.ino(), logical_block);
                return Ok(Some(BlockRun::within(&extent, logical_block)));
            }
            CacheLookup::Gap(_) => {
                trace!("[BMAP] inode {} lbn {} cached hole", file.ino(), logical_block);
                return Ok(None);
            }
            CacheLookup::Miss => {}
        }

        let found = self.extent_tree().find_extent(file, logical_block)?;
        let path = match found {
            Some(path) => path,
            None => {
                warn!(
                    "[BMAP] inode {} is flagged for extents but has no extent root, using block pointers",
                    file.ino()
                );
                return self.bmap_indirect(file, logical_block);
            }
        };

        let run = match *path.matched() {
            ExtentMatch::Leaf { extent, .. } => {
                file.extent_cache_mut().store(&extent, CacheKind::Mapped);
                Some(BlockRun::within(&extent, logical_block))
            }
            ExtentMatch::Gap(gap) => {
                file.extent_cache_mut().store(&gap, CacheKind::Gap);
                None
            }
            ExtentMatch::Unmapped => None,
        };
        path.release();

        debug!("[BMAP] inode {} lbn {} -> {:?}", file.ino(), logical_block, run);
        Ok(run)
    }

    fn bmap_indirect(&mut self, file: &FileNode, logical_block: u32) -> Result<Option<BlockRun>> {
        let mapper = IndirectBlockMapper::new(self.block_size());
        let physical = mapper.map_block(self.bdev_mut(), file, logical_block as u64)?;
        Ok(physical.map(|physical_block| BlockRun {
            physical_block,
            run_length: 1,
        }))
    }

    /// 读取文件的一个逻辑块，空洞返回 `Ok(None)`
    pub fn read_file_block(&mut self, file: &mut FileNode, logical_block: u32) -> Result<Option<BlockBuf>> {
        match self.bmap(file, logical_block)? {
            Some(run) => Ok(Some(self.bdev_mut().bread(run.physical_block)?)),
            None => Ok(None),
        }
    }

    /// 读取目录的一个逻辑块
    ///
    /// 目录中不允许空洞。
    pub fn read_dir_block(&mut self, dir: &mut FileNode, logical_block: u32) -> Result<BlockBuf> {
        match self.read_file_block(dir, logical_block)? {
            Some(buf) => Ok(buf),
            None => {
                error!("[BMAP] directory inode {} has a hole at block {}", dir.ino(), logical_block);
                Err(Error::new(ErrorKind::Corrupted, "Hole in directory"))
            }
        }
    }
}
