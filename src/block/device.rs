//! 块设备核心类型

use crate::cache::{BlockCache, CacheStats};
use crate::error::{Error, ErrorKind, Result};
use alloc::sync::Arc;
use alloc::vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::buf::BlockBuf;

/// 块设备接口
///
/// 实现此 trait 以提供底层只读块设备访问。查找路径从不写盘。
///
/// # 示例
///
/// ```rust,ignore
/// use ext4_index_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn block_size(&self) -> u32 {
///         4096
///     }
///
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_blocks(&self) -> u64 {
///         1000000
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现扇区读取
///         Ok(count as usize * self.sector_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 逻辑块大小（通常 4096）
    fn block_size(&self) -> u32;

    /// 物理扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始地址（以扇区为单位）
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;
}

/// 块设备包装器
///
/// 提供按文件系统块号读取（`bread`）的入口，可选 LRU 块缓存，并统计读取次数。
///
/// 每次 `bread` 返回一个 [`BlockBuf`]，持有期间计入 `outstanding_buffers()`。
/// 查找路径上的每条返回分支都必须把这个计数恢复到调用前的值，测试据此检查缓冲区泄漏。
pub struct BlockDev<D> {
    /// 底层设备
    device: D,
    /// 分区偏移（字节）
    partition_offset: u64,
    /// 逻辑读取次数（包括缓存命中）
    read_count: u64,
    /// 物理读取次数（实际设备操作）
    physical_read_count: u64,
    /// 块缓存（可选）
    bcache: Option<BlockCache>,
    /// 尚未释放的块缓冲区数量
    outstanding: Arc<AtomicUsize>,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器（无缓存）
    pub fn new(device: D) -> Result<Self> {
        let block_size = device.block_size();
        let sector_size = device.sector_size();

        if sector_size == 0 || block_size % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size must be a multiple of sector size",
            ));
        }

        Ok(Self {
            device,
            partition_offset: 0,
            read_count: 0,
            physical_read_count: 0,
            bcache: None,
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 创建带缓存的块设备包装器
    ///
    /// `cache_blocks` 为 0 时不启用缓存。
    pub fn new_with_cache(device: D, cache_blocks: usize) -> Result<Self> {
        let mut bd = Self::new(device)?;
        let block_size = bd.block_size() as usize;
        bd.bcache = BlockCache::new(cache_blocks, block_size);
        Ok(bd)
    }

    /// 设置分区偏移（字节）
    pub fn set_partition_offset(&mut self, offset: u64) {
        self.partition_offset = offset;
    }

    /// 获取分区偏移
    pub fn partition_offset(&self) -> u64 {
        self.partition_offset
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 获取逻辑块大小
    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// 获取物理扇区大小
    pub fn sector_size(&self) -> u32 {
        self.device.sector_size()
    }

    /// 获取总块数
    pub fn total_blocks(&self) -> u64 {
        self.device.total_blocks()
    }

    /// 获取逻辑读取次数（包括缓存命中）
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取物理读取次数（实际设备操作）
    pub fn physical_read_count(&self) -> u64 {
        self.physical_read_count
    }

    /// 尚未释放的块缓冲区数量
    pub fn outstanding_buffers(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// 获取缓存统计信息
    ///
    /// 未启用缓存时返回 None
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.bcache.as_ref().map(|cache| cache.stats())
    }

    /// 检查是否启用了缓存
    pub fn has_cache(&self) -> bool {
        self.bcache.is_some()
    }

    /// 读取一个文件系统块
    ///
    /// 先查块缓存，未命中时从设备读取整块并放入缓存。返回的 [`BlockBuf`]
    /// 在被释放（`release()` 或 drop）之前计入 `outstanding_buffers()`。
    ///
    /// # 错误
    ///
    /// - `Io` - 块号越界、设备读取失败或短读
    pub fn bread(&mut self, lba: u64) -> Result<BlockBuf> {
        self.read_count += 1;

        if lba >= self.device.total_blocks() {
            log::error!(
                "[bread] block {} beyond device end ({} blocks)",
                lba,
                self.device.total_blocks()
            );
            return Err(Error::new(ErrorKind::Io, "Block address beyond device end"));
        }

        if let Some(cache) = &mut self.bcache {
            if let Some(data) = cache.get(lba) {
                log::trace!("[bread] block {} cache hit", lba);
                return Ok(BlockBuf::new(lba, data, &self.outstanding));
            }
        }

        let block_size = self.device.block_size() as usize;
        let mut data = vec![0u8; block_size];
        let pba = self.logical_to_physical(lba);
        let sector_count = self.sectors_per_block();

        self.physical_read_count += 1;
        let read = self.device.read_blocks(pba, sector_count, &mut data)?;
        if read < block_size {
            log::error!("[bread] short read on block {}: {} of {} bytes", lba, read, block_size);
            return Err(Error::new(ErrorKind::Io, "Short read from block device"));
        }

        let data: Arc<[u8]> = Arc::from(data);
        if let Some(cache) = &mut self.bcache {
            cache.insert(lba, data.clone());
        }

        log::trace!("[bread] block {} read from device (sector {})", lba, pba);
        Ok(BlockBuf::new(lba, data, &self.outstanding))
    }

    /// 将文件系统块号转换为设备扇区号
    fn logical_to_physical(&self, lba: u64) -> u64 {
        let block_size = self.device.block_size() as u64;
        let sector_size = self.device.sector_size() as u64;
        (lba * block_size + self.partition_offset) / sector_size
    }

    /// 每个文件系统块包含的扇区数
    fn sectors_per_block(&self) -> u32 {
        self.device.block_size() / self.device.sector_size()
    }
}
