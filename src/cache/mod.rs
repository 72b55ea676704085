//! 块缓存模块
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 块缓存管理器，使用 lru crate 提供 LRU 驱逐
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 与 ext4 extent cache 的区别
//!
//! 这里缓存的是整块磁盘数据，由 [`BlockDev`](crate::block::BlockDev) 持有。
//! 每个文件单槽的映射缓存见 [`crate::extent::ExtentCache`]。
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。

mod block_cache;

pub use block_cache::{BlockCache, CacheStats};
