//! 单槽 extent 缓存
//!
//! 每个文件记住最近一次解析出的一段映射（或空洞）。同一段内的后续查找不再访问磁盘。
//! 缓存只有一个槽位，每次写入都无条件覆盖。

use crate::types::Extent;

/// 缓存槽的内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CacheKind {
    /// 无效（尚未写入）
    #[default]
    Empty = 0,
    /// 空洞
    Gap = 1,
    /// 已映射的 extent
    Mapped = 2,
}

/// 缓存槽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtentCacheEntry {
    /// 内容类型
    pub kind: CacheKind,
    /// 起始逻辑块
    pub logical_start: u32,
    /// 块数
    pub length: u32,
    /// 起始物理块，空洞为 0
    pub physical_start: u64,
}

impl ExtentCacheEntry {
    fn covers(&self, logical_block: u32) -> bool {
        logical_block >= self.logical_start
            && (logical_block as u64) < self.logical_start as u64 + self.length as u64
    }

    fn extent(&self) -> Extent {
        Extent::new(self.logical_start, self.length, self.physical_start)
    }
}

/// 缓存查找结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// 命中已映射的 extent
    Mapped(Extent),
    /// 命中空洞
    Gap(Extent),
    /// 未命中
    Miss,
}

/// 单槽 extent 缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtentCache {
    entry: ExtentCacheEntry,
}

impl ExtentCache {
    /// 创建空缓存
    pub const fn new() -> Self {
        Self {
            entry: ExtentCacheEntry {
                kind: CacheKind::Empty,
                logical_start: 0,
                length: 0,
                physical_start: 0,
            },
        }
    }

    /// 查找逻辑块
    pub fn lookup(&self, logical_block: u32) -> CacheLookup {
        let entry = &self.entry;
        if !entry.covers(logical_block) {
            return CacheLookup::Miss;
        }
        match entry.kind {
            CacheKind::Empty => CacheLookup::Miss,
            CacheKind::Gap => CacheLookup::Gap(entry.extent()),
            CacheKind::Mapped => CacheLookup::Mapped(entry.extent()),
        }
    }

    /// 写入缓存（覆盖原有内容）
    pub fn store(&mut self, extent: &Extent, kind: CacheKind) {
        log::trace!(
            "[EXTENT] cache store {:?} [{}, +{}) -> {}",
            kind,
            extent.logical_start,
            extent.length,
            extent.physical_start
        );
        self.entry = ExtentCacheEntry {
            kind,
            logical_start: extent.logical_start,
            length: extent.length,
            physical_start: extent.physical_start,
        };
    }

    /// 当前缓存槽
    pub fn entry(&self) -> &ExtentCacheEntry {
        &self.entry
    }
}
