//! 块缓冲区句柄 - RAII 风格的块访问

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 已读取的块
///
/// 由 [`BlockDev::bread`](super::BlockDev::bread) 返回。数据本身与块缓存共享，
/// 句柄只负责登记"有人正在使用这个块"。句柄被 drop 或 `release()` 时计数减一。
pub struct BlockBuf {
    lba: u64,
    data: Arc<[u8]>,
    outstanding: Arc<AtomicUsize>,
}

impl BlockBuf {
    pub(super) fn new(lba: u64, data: Arc<[u8]>, outstanding: &Arc<AtomicUsize>) -> Self {
        outstanding.fetch_add(1, Ordering::AcqRel);
        Self {
            lba,
            data,
            outstanding: outstanding.clone(),
        }
    }

    /// 块号
    pub fn lba(&self) -> u64 {
        self.lba
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 释放缓冲区
    pub fn release(self) {}
}

impl Drop for BlockBuf {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for BlockBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockBuf")
            .field("lba", &self.lba)
            .field("len", &self.data.len())
            .finish()
    }
}
