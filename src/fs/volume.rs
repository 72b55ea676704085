//! 卷：块设备与文件系统配置的组合

use crate::block::{BlockDev, BlockDevice};
use crate::dir::HTree;
use crate::error::{Error, ErrorKind, Result};
use crate::extent::ExtentTree;

use super::config::FsConfig;
use super::inode::FileNode;

/// ext4 卷
///
/// 把 [`BlockDev`] 和 [`FsConfig`] 绑在一起，是 extent 解析和目录查找的入口。
pub struct Ext4Volume<D> {
    bdev: BlockDev<D>,
    config: FsConfig,
}

impl<D: BlockDevice> Ext4Volume<D> {
    /// 用已有的块设备包装器创建卷
    ///
    /// # 错误
    ///
    /// - `InvalidInput` - 配置无效，或设备块大小与配置不一致
    pub fn new(bdev: BlockDev<D>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        if bdev.block_size() != config.block_size {
            log::error!(
                "[VOLUME] device block size {} != filesystem block size {}",
                bdev.block_size(),
                config.block_size
            );
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Device block size does not match filesystem block size",
            ));
        }
        Ok(Self { bdev, config })
    }

    /// 打开设备，按配置启用块缓存
    pub fn open(device: D, config: FsConfig) -> Result<Self> {
        let bdev = BlockDev::new_with_cache(device, config.bcache_size)?;
        Self::new(bdev, config)
    }

    /// 文件系统配置
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// 文件系统块大小
    pub fn block_size(&self) -> u32 {
        self.config.block_size
    }

    /// 读取 `file` 中逻辑块 `logical_block` 时使用的块大小
    ///
    /// ext2/3/4 没有 UFS 那样的片段（fragment），所以总是整块。
    pub fn block_size_for(&self, _file: &FileNode, _logical_block: u32) -> u32 {
        self.config.block_size
    }

    /// 块设备包装器
    pub fn bdev(&self) -> &BlockDev<D> {
        &self.bdev
    }

    /// 块设备包装器（可变）
    pub fn bdev_mut(&mut self) -> &mut BlockDev<D> {
        &mut self.bdev
    }

    /// extent 树解析器
    pub fn extent_tree(&mut self) -> ExtentTree<'_, D> {
        let block_size = self.config.block_size;
        ExtentTree::new(&mut self.bdev, block_size)
    }

    /// HTree 目录索引
    pub fn htree(&mut self) -> HTree<'_, D> {
        HTree::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[test]
    fn test_open_with_cache() {
        let vol = Ext4Volume::open(MockDevice::new(16), FsConfig::default()).unwrap();
        assert!(vol.bdev().has_cache());
        assert_eq!(vol.block_size(), 4096);
    }

    #[test]
    fn test_open_without_cache() {
        let config = FsConfig {
            bcache_size: 0,
            ..FsConfig::default()
        };
        let vol = Ext4Volume::open(MockDevice::new(16), config).unwrap();
        assert!(!vol.bdev().has_cache());
    }

    #[test]
    fn test_block_size_mismatch() {
        let err = Ext4Volume::open(MockDevice::new(16), FsConfig::with_block_size(1024))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_block_size_for_is_full_block() {
        let vol = Ext4Volume::open(MockDevice::new(16), FsConfig::default()).unwrap();
        let file = FileNode::new(12, 0o100644, Default::default(), 10, [0; 60]);
        assert_eq!(vol.block_size_for(&file, 0), 4096);
        assert_eq!(vol.block_size_for(&file, 1000), 4096);
    }
}
