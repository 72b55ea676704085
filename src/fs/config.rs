//! 文件系统配置
//!
//! 查找路径需要的 superblock 字段：块大小、目录哈希种子、哈希签名标志和特性位。
//! 调用者负责从 superblock 中解析这些值。

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{CompatFeatures, RoCompatFeatures, SuperFlags};

/// 文件系统配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// 文件系统块大小（字节）
    pub block_size: u32,
    /// 块缓存大小（块数），0 表示不缓存
    pub bcache_size: usize,
    /// 目录哈希种子（`s_hash_seed`），全 0 表示使用默认种子
    pub hash_seed: [u32; 4],
    /// superblock 标志（有符号 / 无符号哈希）
    pub flags: SuperFlags,
    /// 兼容特性
    pub compat: CompatFeatures,
    /// 只读兼容特性
    pub ro_compat: RoCompatFeatures,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_size: EXT4_DEFAULT_BLOCK_SIZE,
            bcache_size: EXT4_DEFAULT_BCACHE_SIZE,
            hash_seed: [0; 4],
            flags: SuperFlags::empty(),
            compat: CompatFeatures::DIR_INDEX,
            ro_compat: RoCompatFeatures::empty(),
        }
    }
}

impl FsConfig {
    /// 指定块大小的默认配置
    pub fn with_block_size(block_size: u32) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    /// 检查配置
    ///
    /// 块大小必须是 2 的幂，且在 1 KiB 到 64 KiB 之间。
    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two()
            || self.block_size < EXT4_MIN_BLOCK_SIZE
            || self.block_size > EXT4_MAX_BLOCK_SIZE
        {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size must be a power of two between 1 KiB and 64 KiB",
            ));
        }
        Ok(())
    }

    /// log2(块大小)
    pub fn block_size_bits(&self) -> u32 {
        self.block_size.trailing_zeros()
    }

    /// 目录哈希版本的无符号偏移
    ///
    /// 设置了 `UNSIGNED_HASH` 标志时为 3，否则为 0。
    pub fn unsigned_hash_offset(&self) -> u8 {
        if self.flags.contains(SuperFlags::UNSIGNED_HASH) {
            3
        } else {
            0
        }
    }

    /// 是否启用目录索引
    pub fn has_dir_index(&self) -> bool {
        self.compat.contains(CompatFeatures::DIR_INDEX)
    }

    /// 是否启用元数据校验和
    pub fn has_metadata_csum(&self) -> bool {
        self.ro_compat.contains(RoCompatFeatures::METADATA_CSUM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size_bits(), 12);
        assert!(config.has_dir_index());
        assert!(!config.has_metadata_csum());
    }

    #[test]
    fn test_block_size_validation() {
        assert!(FsConfig::with_block_size(1024).validate().is_ok());
        assert!(FsConfig::with_block_size(65536).validate().is_ok());

        for bad in [0, 512, 3000, 131072] {
            let err = FsConfig::with_block_size(bad).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_unsigned_hash_offset() {
        let mut config = FsConfig::default();
        assert_eq!(config.unsigned_hash_offset(), 0);

        config.flags = SuperFlags::SIGNED_HASH;
        assert_eq!(config.unsigned_hash_offset(), 0);

        config.flags = SuperFlags::UNSIGNED_HASH;
        assert_eq!(config.unsigned_hash_offset(), 3);
    }
}
