//! ext4_index_core: ext4 extent 树与 HTree 目录索引的只读查找核心
//!
//! 提供两条查找路径：
//! - **extent 解析**：逻辑块 → 物理块，带每个文件的单槽 extent 缓存，
//!   非 extent 文件退回间接块映射
//! - **目录查找**：名称 → 目录项，索引目录走 HTree（legacy / half-MD4 / TEA 哈希），
//!   其余目录线性扫描
//!
//! # 示例
//!
//! ```rust,ignore
//! use ext4_index_core::{BlockDevice, Ext4Volume, FileNode, FsConfig, Result};
//!
//! fn resolve<D: BlockDevice>(device: D, raw_dir: &[u8], raw_file: &[u8]) -> Result<()> {
//!     let mut vol = Ext4Volume::open(device, FsConfig::default())?;
//!
//!     let mut dir = FileNode::from_raw(2, raw_dir)?;
//!     if let Some(found) = vol.find_entry(&mut dir, b"hello.txt")? {
//!         log::info!("hello.txt -> inode {}", found.inode());
//!     }
//!
//!     let mut file = FileNode::from_raw(12, raw_file)?;
//!     if let Some(run) = vol.bmap(&mut file, 0)? {
//!         log::info!("block 0 -> {} (+{})", run.physical_block, run.run_length);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和带引用计数的块缓冲区
//! - [`cache`] - LRU 块缓存
//! - [`consts`] - 常量定义
//! - [`types`] - 磁盘结构解码
//! - [`fs`] - 卷、配置和文件节点
//! - [`extent`] - extent 树查找、extent 缓存、bmap
//! - [`indirect`] - 间接块映射
//! - [`dir`] - HTree 哈希、索引下降和目录查找

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

/// 卷与文件节点
pub mod fs;

/// Extent 树查找
pub mod extent;

/// Indirect blocks 操作（传统 ext2/ext3 间接块寻址）
pub mod indirect;

/// 目录查找
pub mod dir;

/// 块缓存
pub mod cache;

#[cfg(test)]
pub(crate) mod testing;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockBuf, BlockDev, BlockDevice};

// 文件系统
pub use fs::{Ext4Volume, FileNode, FsConfig};

// Extent
pub use extent::{BlockRun, CacheKind, ExtentCache, ExtentMatch, ExtentPath, ExtentTree};

// Indirect blocks
pub use indirect::IndirectBlockMapper;

// Dir
pub use dir::{htree_hash, DirBlockScanner, DirMatch, DirSearch, HTree, HashVersion, LinearScanner};

// Cache
pub use cache::{BlockCache, CacheStats};
