//! Extent 树查找模块
//!
//! Extent 是现代 ext4 文件系统中用于表示文件数据块位置的机制，
//! 相比传统的间接块方式更高效。本模块只实现读路径。
//!
//! ## 子模块
//!
//! - `tree` - Extent 树解析：`find_extent()` 逐层二分查找，合成空洞
//! - `cache` - 每个文件的单槽 extent 缓存
//! - `map` - `Ext4Volume::bmap()`：缓存 → 树查找 → 写回缓存，必要时退回间接块映射

mod cache;
mod map;
mod tree;

pub use cache::{CacheKind, CacheLookup, ExtentCache, ExtentCacheEntry};
pub use map::BlockRun;
pub use tree::{ExtentMatch, ExtentPath, ExtentTree};
