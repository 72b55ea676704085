//! 间接块映射器实现
//!
//! 将文件的逻辑块号映射到物理块号，支持直接块和多级间接块。
//! 用于没有 extent 树根的 inode（ext2/ext3 格式）。

use crate::block::{BlockDev, BlockDevice};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::fs::FileNode;
use byteorder::{ByteOrder, LittleEndian};

/// 间接块映射器
pub struct IndirectBlockMapper {
    /// 每个间接块可以容纳的指针数量 (block_size / 4)
    blocks_per_indirect: u32,

    /// 每个间接层级的块数限制
    ///
    /// - limits[0] = 12 (直接块)
    /// - limits[1] = 12 + blocks_per_indirect (一级间接)
    /// - limits[2] = limits[1] + blocks_per_indirect^2 (二级间接)
    /// - limits[3] = limits[2] + blocks_per_indirect^3 (三级间接)
    block_limits: [u64; 4],

    /// 每个层级可以寻址的块数
    blocks_per_level: [u64; 4],
}

impl IndirectBlockMapper {
    /// 创建新的间接块映射器
    pub fn new(block_size: u32) -> Self {
        let blocks_per_indirect = block_size / 4;

        let mut block_limits = [0u64; 4];
        let mut blocks_per_level = [0u64; 4];
        block_limits[0] = EXT4_INODE_DIRECT_BLOCKS as u64;
        blocks_per_level[0] = 1;

        for i in 1..4 {
            blocks_per_level[i] = blocks_per_level[i - 1] * blocks_per_indirect as u64;
            block_limits[i] = block_limits[i - 1] + blocks_per_level[i];
        }

        Self {
            blocks_per_indirect,
            block_limits,
            blocks_per_level,
        }
    }

    /// 将逻辑块号映射到物理块号
    ///
    /// # 返回
    ///
    /// - `Ok(Some(physical_block))`: 找到了对应的物理块
    /// - `Ok(None)`: 逻辑块号对应的是文件空洞
    /// - `Err(...)`: 读取间接块失败，或逻辑块号超出可寻址范围
    pub fn map_block<D: BlockDevice>(
        &self,
        bdev: &mut BlockDev<D>,
        file: &FileNode,
        logical_block: u64,
    ) -> Result<Option<u64>> {
        if logical_block < self.block_limits[0] {
            let ptr = file.block_pointer(logical_block as usize);
            log::trace!("[indirect] direct block {} -> {}", logical_block, ptr);
            return Ok(nonzero(ptr));
        }

        let level = self.determine_indirect_level(logical_block)?;
        let root_slot = match level {
            1 => EXT4_INODE_INDIRECT_BLOCK,
            2 => EXT4_INODE_DOUBLE_INDIRECT_BLOCK,
            _ => EXT4_INODE_TRIPLE_INDIRECT_BLOCK,
        };

        let mut block = match nonzero(file.block_pointer(root_slot)) {
            Some(block) => block,
            None => return Ok(None),
        };

        // 自顶向下，每层用商选出下一层的指针
        let mut offset = logical_block - self.block_limits[level - 1];
        for depth in (0..level).rev() {
            let index = offset / self.blocks_per_level[depth];
            offset %= self.blocks_per_level[depth];

            block = match self.read_block_pointer(bdev, block, index as u32)? {
                Some(next) => next,
                None => return Ok(None),
            };
        }

        log::trace!("[indirect] level {} block {} -> {}", level, logical_block, block);
        Ok(Some(block))
    }

    /// 确定逻辑块号对应的间接层级
    fn determine_indirect_level(&self, logical_block: u64) -> Result<usize> {
        (1..4)
            .find(|&level| logical_block < self.block_limits[level])
            .ok_or(Error::new(
                ErrorKind::InvalidInput,
                "Logical block number exceeds maximum file size",
            ))
    }

    /// 从间接块中读取第 `index` 个块指针，0 表示空洞
    fn read_block_pointer<D: BlockDevice>(
        &self,
        bdev: &mut BlockDev<D>,
        indirect_block: u64,
        index: u32,
    ) -> Result<Option<u64>> {
        if index >= self.blocks_per_indirect {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Index out of bounds in indirect block",
            ));
        }

        let buf = bdev.bread(indirect_block)?;
        let offset = index as usize * 4;
        let ptr = LittleEndian::read_u32(&buf.data()[offset..offset + 4]);
        Ok(nonzero(ptr))
    }
}

fn nonzero(ptr: u32) -> Option<u64> {
    if ptr == 0 {
        None
    } else {
        Some(ptr as u64)
    }
}
