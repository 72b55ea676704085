//! 常量定义
//!
//! 这个模块包含 extent 树和 HTree 查找用到的磁盘格式常量：
//! - 块大小限制
//! - extent 头部与记录尺寸
//! - 目录项和 HTree 布局偏移
//! - 特性标志位

//=============================================================================
// 基础常量
//=============================================================================

/// 默认物理块大小（扇区大小，512 字节）
pub const EXT4_DEFAULT_SECTOR_SIZE: u32 = 512;

/// 默认逻辑块大小（4096 字节）
pub const EXT4_DEFAULT_BLOCK_SIZE: u32 = 4096;

/// 最小块大小（1024 字节）
pub const EXT4_MIN_BLOCK_SIZE: u32 = 1024;

/// 最大块大小（65536 字节）
pub const EXT4_MAX_BLOCK_SIZE: u32 = 65536;

/// 默认块缓存大小（块数）
pub const EXT4_DEFAULT_BCACHE_SIZE: usize = 256;

//=============================================================================
// Inode 块指针区
//=============================================================================

/// inode 中块指针数量
pub const EXT4_INODE_BLOCKS: usize = 15;

/// inode 块指针区字节数（15 * 4）
pub const EXT4_INODE_BLOCK_AREA_SIZE: usize = EXT4_INODE_BLOCKS * 4;

/// 直接块数量
pub const EXT4_INODE_DIRECT_BLOCKS: usize = 12;

/// 一级间接块指针索引
pub const EXT4_INODE_INDIRECT_BLOCK: usize = 12;

/// 二级间接块指针索引
pub const EXT4_INODE_DOUBLE_INDIRECT_BLOCK: usize = 13;

/// 三级间接块指针索引
pub const EXT4_INODE_TRIPLE_INDIRECT_BLOCK: usize = 14;

/// inode 标志：使用 extent
pub const EXT4_INODE_FLAG_EXTENTS: u32 = 0x0008_0000;

/// inode 标志：目录使用 HTree 索引
pub const EXT4_INODE_FLAG_INDEX: u32 = 0x0000_1000;

/// inode 类型掩码
pub const EXT4_INODE_MODE_TYPE_MASK: u16 = 0xF000;

/// 目录
pub const EXT4_INODE_MODE_DIRECTORY: u16 = 0x4000;

/// 普通文件
pub const EXT4_INODE_MODE_FILE: u16 = 0x8000;

//=============================================================================
// Extent 树
//=============================================================================

/// extent 头部魔数
pub const EXT4_EXTENT_MAGIC: u16 = 0xF30A;

/// extent 头部大小
pub const EXT4_EXTENT_HEADER_SIZE: usize = 12;

/// extent / extent 索引记录大小
pub const EXT4_EXTENT_ENTRY_SIZE: usize = 12;

/// extent 树最大深度
pub const EXT4_EXTENT_MAX_DEPTH: u16 = 5;

//=============================================================================
// 目录项与 HTree
//=============================================================================

/// 目录项固定头部长度（inode + rec_len + name_len + file_type）
pub const EXT4_DIR_ENTRY_MIN_LEN: usize = 8;

/// 目录项对齐
pub const EXT4_DIR_ENTRY_ALIGN: usize = 4;

/// 最大文件名长度
pub const EXT4_NAME_MAX: usize = 255;

/// HTree 条目大小（hash + block）
pub const EXT4_HTREE_ENTRY_SIZE: usize = 8;

/// HTree 块号字段的有效位（低 24 位）
pub const EXT4_HTREE_BLOCK_MASK: u32 = 0x00FF_FFFF;

/// HTree 根块中 root info 的偏移（"." 与 ".." 两个 12 字节目录项之后）
pub const EXT4_HTREE_ROOT_INFO_OFFSET: usize = 24;

/// HTree 非根索引块中条目的偏移（假目录项之后）
pub const EXT4_HTREE_NODE_ENTRIES_OFFSET: usize = 8;

/// HTree 索引尾部（metadata_csum）大小
pub const EXT4_HTREE_TAIL_SIZE: usize = 8;

/// HTree 最大间接层数
pub const EXT4_HTREE_MAX_LEVELS: usize = 2;

/// 计算名称长度为 `name_len` 的目录项记录长度
///
/// 对应 `EXT2_DIR_REC_LEN()`：8 字节头部加名称，按 4 字节对齐。
pub const fn dir_rec_len(name_len: usize) -> usize {
    (EXT4_DIR_ENTRY_MIN_LEN + name_len + EXT4_DIR_ENTRY_ALIGN - 1) & !(EXT4_DIR_ENTRY_ALIGN - 1)
}

//=============================================================================
// 特性标志
//=============================================================================

/// 兼容特性：目录索引
pub const EXT4_FEATURE_COMPAT_DIR_INDEX: u32 = 0x0020;

/// 只读兼容特性：元数据校验和
pub const EXT4_FEATURE_RO_COMPAT_METADATA_CSUM: u32 = 0x0400;

/// Superblock 标志：有符号目录哈希
pub const EXT4_SUPERBLOCK_FLAGS_SIGNED_HASH: u32 = 0x0001;

/// Superblock 标志：无符号目录哈希
pub const EXT4_SUPERBLOCK_FLAGS_UNSIGNED_HASH: u32 = 0x0002;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_rec_len() {
        assert_eq!(dir_rec_len(0), 8);
        assert_eq!(dir_rec_len(1), 12);
        assert_eq!(dir_rec_len(2), 12);
        assert_eq!(dir_rec_len(4), 12);
        assert_eq!(dir_rec_len(5), 16);
        assert_eq!(dir_rec_len(255), 264);
    }
}
