//! 块缓存实现（基于 lru crate）
//!
//! 只读查找路径不会产生脏块，所以缓存里只存放块数据本身。数据用 `Arc<[u8]>`
//! 保存，命中时直接共享给 [`BlockBuf`](crate::block::BlockBuf)，不做拷贝。

use alloc::sync::Arc;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 因容量不足被驱逐的块数
    pub evictions: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 块缓存
///
/// `get` 会把块移到最近使用端，`insert` 在满时驱逐最久未使用的块。
pub struct BlockCache {
    cache: LruCache<u64, Arc<[u8]>>,
    block_size: usize,
    stats: CacheStats,
}

impl BlockCache {
    /// 创建新的块缓存
    ///
    /// `capacity` 为 0 时返回 None。
    ///
    /// ```rust,ignore
    /// let cache = BlockCache::new(256, 4096).unwrap();  // 256 个 4KB 块
    /// ```
    pub fn new(capacity: usize, block_size: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            cache: LruCache::new(capacity),
            block_size,
            stats: CacheStats::default(),
        })
    }

    /// 查找块
    pub fn get(&mut self, lba: u64) -> Option<Arc<[u8]>> {
        match self.cache.get(&lba) {
            Some(data) => {
                self.stats.hits += 1;
                Some(data.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 放入块
    pub fn insert(&mut self, lba: u64, data: Arc<[u8]>) {
        debug_assert_eq!(data.len(), self.block_size);
        if let Some((evicted, _)) = self.cache.push(lba, data) {
            if evicted != lba {
                self.stats.evictions += 1;
                log::trace!("[CACHE] evicted LBA={:#x}", evicted);
            }
        }
    }

    /// 当前缓存的块数
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// 缓存容量（块数）
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
