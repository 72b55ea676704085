//! Extent 树解析
//!
//! 从 inode 的 60 字节根节点出发，逐层二分查找，定位包含目标逻辑块的 extent。
//! 目标落在两个 extent 之间（或第一个 extent 之前、最后一个之后）时，合成一个
//! 覆盖该位置的空洞 extent。

use crate::{
    block::{BlockBuf, BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::FileNode,
    types::{Extent, ExtentHeader, ExtentIndex},
};
use log::*;

/// 查找在某个节点上停下时的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentMatch {
    /// 叶子节点为空，没有任何映射
    Unmapped,
    /// 命中叶子中第 `slot` 个 extent
    Leaf {
        /// 叶子内的槽位
        slot: usize,
        /// 命中的 extent
        extent: Extent,
    },
    /// 目标位于空洞中
    Gap(Extent),
}

/// 查找路径
///
/// 记录查找停下的节点（头部和深度）和结果。如果停在磁盘块上，同时持有该块的缓冲区，
/// 直到路径被 drop 或 `release()`。
#[derive(Debug)]
pub struct ExtentPath {
    level: usize,
    header: ExtentHeader,
    matched: ExtentMatch,
    buf: Option<BlockBuf>,
}

impl ExtentPath {
    /// 停下时所在节点的深度（叶子为 0）
    pub fn depth(&self) -> u16 {
        self.header.depth
    }

    /// 从根向下走过的层数（根为 0）
    pub fn level(&self) -> usize {
        self.level
    }

    /// 停下时所在节点的头部
    pub fn header(&self) -> &ExtentHeader {
        &self.header
    }

    /// 查找结果
    pub fn matched(&self) -> &ExtentMatch {
        &self.matched
    }

    /// 命中的 extent 或合成的空洞
    pub fn extent(&self) -> Option<&Extent> {
        match &self.matched {
            ExtentMatch::Leaf { extent, .. } => Some(extent),
            ExtentMatch::Gap(extent) => Some(extent),
            ExtentMatch::Unmapped => None,
        }
    }

    /// 是否是空洞
    pub fn is_gap(&self) -> bool {
        matches!(self.matched, ExtentMatch::Gap(_))
    }

    /// 当前持有的节点块
    pub fn buffer(&self) -> Option<&BlockBuf> {
        self.buf.as_ref()
    }

    /// 释放持有的块缓冲区
    pub fn release(self) {}
}

/// 一次索引节点查找的结果
enum IndexStep {
    Gap(Extent),
    Descend {
        child: u64,
        first_lbn: u32,
        last_lbn: u32,
    },
}

/// Extent 树遍历器
pub struct ExtentTree<'a, D: BlockDevice> {
    bdev: &'a mut BlockDev<D>,
    block_size: u32,
}

impl<'a, D: BlockDevice> ExtentTree<'a, D> {
    /// 创建新的 extent 树遍历器
    pub fn new(bdev: &'a mut BlockDev<D>, block_size: u32) -> Self {
        Self { bdev, block_size }
    }

    /// 查找包含 `logical_block` 的 extent
    ///
    /// # 返回
    ///
    /// - `Ok(None)` - 根节点魔数不符，文件不是 extent 映射（调用者改用间接块映射）
    /// - `Ok(Some(path))` - 查找结果，见 [`ExtentMatch`]
    ///
    /// # 错误
    ///
    /// - `Io` - 读取子节点失败
    /// - `Corrupted` - 节点结构不满足不变量
    ///
    /// 出错时所有已读取的块都已释放。本函数不读写 extent 缓存。
    pub fn find_extent(&mut self, file: &FileNode, logical_block: u32) -> Result<Option<ExtentPath>> {
        let root = file.block_area();
        let mut header = ExtentHeader::parse(root)?;
        if !header.is_valid() {
            debug!("[EXTENT] inode {} has no extent root (magic {:#x})", file.ino(), header.magic);
            return Ok(None);
        }
        if header.depth > EXT4_EXTENT_MAX_DEPTH {
            error!("[EXTENT] inode {} root depth {} too large", file.ino(), header.depth);
            return Err(Error::new(ErrorKind::Corrupted, "Extent tree too deep"));
        }

        let mut first_lbn = 0u32;
        let mut last_lbn = file.last_logical_block(self.block_size);
        let mut buf: Option<BlockBuf> = None;
        let mut level = 0usize;

        trace!(
            "[EXTENT] find inode={} lbn={} depth={} range=[{}, {}]",
            file.ino(),
            logical_block,
            header.depth,
            first_lbn,
            last_lbn
        );

        loop {
            let node: &[u8] = match &buf {
                Some(b) => b.data(),
                None => &root[..],
            };
            check_node(node, &header)?;

            if header.is_leaf() {
                let matched = search_leaf(node, &header, logical_block, first_lbn, last_lbn)?;
                trace!("[EXTENT] lbn={} stopped at level {}: {:?}", logical_block, level, matched);
                return Ok(Some(ExtentPath {
                    level,
                    header,
                    matched,
                    buf,
                }));
            }

            match search_index(node, &header, logical_block, first_lbn, last_lbn)? {
                IndexStep::Gap(gap) => {
                    trace!("[EXTENT] lbn={} in index gap {:?}", logical_block, gap);
                    return Ok(Some(ExtentPath {
                        level,
                        header,
                        matched: ExtentMatch::Gap(gap),
                        buf,
                    }));
                }
                IndexStep::Descend {
                    child,
                    first_lbn: first,
                    last_lbn: last,
                } => {
                    first_lbn = first;
                    last_lbn = last;

                    // 先释放上一层再读下一层
                    drop(buf.take());
                    let next = self.bdev.bread(child)?;
                    let next_header = ExtentHeader::parse(next.data())?;

                    if !next_header.is_valid() {
                        error!("[EXTENT] block {} has bad magic {:#x}", child, next_header.magic);
                        return Err(Error::new(ErrorKind::Corrupted, "Invalid extent header magic"));
                    }
                    if header.depth.checked_sub(1) != Some(next_header.depth) {
                        error!(
                            "[EXTENT] block {} depth {} under parent depth {}",
                            child, next_header.depth, header.depth
                        );
                        return Err(Error::new(ErrorKind::Corrupted, "Extent node depth mismatch"));
                    }

                    header = next_header;
                    buf = Some(next);
                    level += 1;
                }
            }
        }
    }
}

/// 检查节点头部与节点大小
fn check_node(node: &[u8], header: &ExtentHeader) -> Result<()> {
    if !header.is_valid() {
        return Err(Error::new(ErrorKind::Corrupted, "Invalid extent header magic"));
    }
    let entries = header.entry_count as usize;
    if entries > header.capacity as usize
        || EXT4_EXTENT_HEADER_SIZE + entries * EXT4_EXTENT_ENTRY_SIZE > node.len()
    {
        error!(
            "[EXTENT] entry count {} exceeds capacity {} / node size {}",
            entries,
            header.capacity,
            node.len()
        );
        return Err(Error::new(ErrorKind::Corrupted, "Extent entry count exceeds node capacity"));
    }
    if !header.is_leaf() && entries == 0 {
        return Err(Error::new(ErrorKind::Corrupted, "Empty extent index node"));
    }
    Ok(())
}

fn entry(node: &[u8], i: usize) -> &[u8] {
    let off = EXT4_EXTENT_HEADER_SIZE + i * EXT4_EXTENT_ENTRY_SIZE;
    &node[off..off + EXT4_EXTENT_ENTRY_SIZE]
}

fn index_at(node: &[u8], i: usize) -> Result<ExtentIndex> {
    ExtentIndex::parse(entry(node, i))
}

fn extent_at(node: &[u8], i: usize) -> Result<Extent> {
    Extent::parse(entry(node, i))
}

/// 返回第一个起点大于 `logical_block` 的条目下标
fn upper_bound<F>(count: usize, logical_block: u32, start_of: F) -> Result<usize>
where
    F: Fn(usize) -> Result<u32>,
{
    let (mut lo, mut hi) = (0usize, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if logical_block < start_of(mid)? {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}

fn gap_between(start: u64, end: u64) -> Extent {
    let len = end.saturating_sub(start).min(u32::MAX as u64) as u32;
    Extent::gap(start as u32, len)
}

fn search_index(
    node: &[u8],
    header: &ExtentHeader,
    logical_block: u32,
    first_lbn: u32,
    last_lbn: u32,
) -> Result<IndexStep> {
    let count = header.entry_count as usize;
    let upper = upper_bound(count, logical_block, |i| Ok(index_at(node, i)?.logical_start))?;

    if upper == 0 {
        let first = index_at(node, 0)?;
        return Ok(IndexStep::Gap(gap_between(first_lbn as u64, first.logical_start as u64)));
    }

    let chosen = index_at(node, upper - 1)?;
    let last_lbn = if upper < count {
        index_at(node, upper)?.logical_start - 1
    } else {
        last_lbn
    };

    Ok(IndexStep::Descend {
        child: chosen.child_block,
        first_lbn: chosen.logical_start,
        last_lbn,
    })
}

fn search_leaf(
    node: &[u8],
    header: &ExtentHeader,
    logical_block: u32,
    first_lbn: u32,
    last_lbn: u32,
) -> Result<ExtentMatch> {
    let count = header.entry_count as usize;
    if count == 0 {
        return Ok(ExtentMatch::Unmapped);
    }

    let upper = upper_bound(count, logical_block, |i| Ok(extent_at(node, i)?.logical_start))?;
    if upper == 0 {
        let first = extent_at(node, 0)?;
        return Ok(ExtentMatch::Gap(gap_between(first_lbn as u64, first.logical_start as u64)));
    }

    let slot = upper - 1;
    let extent = extent_at(node, slot)?;
    if extent.end() > logical_block as u64 {
        return Ok(ExtentMatch::Leaf { slot, extent });
    }

    // 目标在 extent 之后：空洞延伸到下一个 extent，或到文件末尾
    let gap_start = extent.end();
    let gap_end = if upper < count {
        extent_at(node, upper)?.logical_start as u64
    } else {
        // 文件末尾之后的目标同样要被空洞覆盖
        last_lbn.max(logical_block) as u64 + 1
    };
    Ok(ExtentMatch::Gap(gap_between(gap_start, gap_end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{extent_file, root_index, root_leaf, write_index, write_leaf, MockDevice};
    use alloc::vec::Vec;

    const BS: u32 = 4096;

    fn bdev(dev: MockDevice) -> BlockDev<MockDevice> {
        BlockDev::new(dev).unwrap()
    }

    /// 深度 1：根索引 [0 -> 50, 100 -> 51]
    /// 块 50: [0,10)->1000, [20,30)->2000；块 51: [100,105)->3000
    fn two_level_device() -> MockDevice {
        let mut dev = MockDevice::new(64);
        write_leaf(dev.block_mut(50), &[(0, 10, 1000), (20, 10, 2000)]);
        write_leaf(dev.block_mut(51), &[(100, 5, 3000)]);
        dev
    }

    fn two_level_file() -> FileNode {
        extent_file(200 * BS as u64, root_index(1, &[(0, 50), (100, 51)]))
    }

    #[test]
    fn test_simple_mapped_read() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(10 * BS as u64, root_leaf(&[(0, 10, 1000)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 5).unwrap().unwrap();
        assert_eq!(
            *path.matched(),
            ExtentMatch::Leaf {
                slot: 0,
                extent: Extent::new(0, 10, 1000)
            }
        );
        assert_eq!(path.extent().unwrap().physical_for(5), 1005);
        assert_eq!(path.depth(), 0);
        assert!(path.buffer().is_none());
        assert_eq!(bd.read_count(), 0);
    }

    #[test]
    fn test_leading_gap() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(20 * BS as u64, root_leaf(&[(10, 5, 500)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 2).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(0, 10)));
        assert!(path.is_gap());
    }

    #[test]
    fn test_trailing_gap_runs_to_last_block() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(20 * BS as u64, root_leaf(&[(10, 5, 500)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 17).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(15, 6)));
    }

    #[test]
    fn test_gap_past_end_of_file_covers_target() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(4 * BS as u64, root_leaf(&[(0, 4, 100)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 10).unwrap().unwrap();
        let gap = *path.extent().unwrap();
        assert!(path.is_gap());
        assert_eq!(gap.logical_start, 4);
        assert!(gap.contains(10));
    }

    #[test]
    fn test_middle_gap() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(14 * BS as u64, root_leaf(&[(0, 4, 100), (10, 4, 200)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 6).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(4, 6)));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 13).unwrap().unwrap();
        assert_eq!(
            *path.matched(),
            ExtentMatch::Leaf {
                slot: 1,
                extent: Extent::new(10, 4, 200)
            }
        );
    }

    #[test]
    fn test_empty_leaf_is_unmapped() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(BS as u64, root_leaf(&[]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 0).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Unmapped);
        assert!(path.extent().is_none());
    }

    #[test]
    fn test_non_extent_root() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(BS as u64, [0u8; 60]);
        assert!(ExtentTree::new(&mut bd, BS).find_extent(&file, 0).unwrap().is_none());
    }

    #[test]
    fn test_two_level_lookup_holds_leaf_buffer() {
        let mut bd = bdev(two_level_device());
        let file = two_level_file();

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 25).unwrap().unwrap();
        assert_eq!(
            *path.matched(),
            ExtentMatch::Leaf {
                slot: 1,
                extent: Extent::new(20, 10, 2000)
            }
        );
        assert_eq!(path.level(), 1);
        assert_eq!(path.buffer().map(|b| b.lba()), Some(50));
        assert_eq!(bd.outstanding_buffers(), 1);

        path.release();
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_gap_bounded_by_next_index() {
        let mut bd = bdev(two_level_device());
        let file = two_level_file();

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 50).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(30, 70)));
        drop(path);

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 150).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(105, 96)));
    }

    #[test]
    fn test_index_level_gap_reads_nothing() {
        let mut bd = bdev(two_level_device());
        let file = extent_file(200 * BS as u64, root_index(1, &[(10, 50)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 3).unwrap().unwrap();
        assert_eq!(*path.matched(), ExtentMatch::Gap(Extent::gap(0, 10)));
        assert_eq!(path.depth(), 1);
        assert_eq!(bd.read_count(), 0);
    }

    #[test]
    fn test_every_block_is_covered() {
        let mut bd = bdev(two_level_device());
        let file = two_level_file();

        for lbn in 0..=200u32 {
            let path = ExtentTree::new(&mut bd, BS).find_extent(&file, lbn).unwrap().unwrap();
            let extent = path.extent().unwrap();
            assert!(extent.contains(lbn), "lbn {} not covered by {:?}", lbn, extent);
            if let ExtentMatch::Leaf { extent, .. } = path.matched() {
                assert_ne!(extent.physical_start, 0);
            }
        }
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_ranges_partition_the_file() {
        let mut bd = bdev(two_level_device());
        let file = two_level_file();

        // 相邻结果首尾相接：[0,10) [10,20) [20,30) [30,100) [100,105) [105,201)
        let mut starts = Vec::new();
        let mut next_start = 0u64;
        while next_start <= 200 {
            let path = ExtentTree::new(&mut bd, BS)
                .find_extent(&file, next_start as u32)
                .unwrap()
                .unwrap();
            let extent = *path.extent().unwrap();
            assert_eq!(extent.logical_start as u64, next_start);
            assert!(extent.length > 0);
            starts.push(extent.logical_start);
            next_start = extent.end();
        }
        assert_eq!(next_start, 201);
        assert_eq!(starts, [0, 10, 20, 30, 100, 105]);
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_repeated_lookup_is_stable() {
        let mut bd = bdev(two_level_device());
        let file = two_level_file();

        for lbn in [5u32, 25, 50, 150] {
            let first = ExtentTree::new(&mut bd, BS).find_extent(&file, lbn).unwrap().unwrap();
            let first_match = *first.matched();
            drop(first);
            let second = ExtentTree::new(&mut bd, BS).find_extent(&file, lbn).unwrap().unwrap();
            assert_eq!(*second.matched(), first_match, "lbn {}", lbn);
            drop(second);
            assert_eq!(bd.outstanding_buffers(), 0);
        }
    }

    #[test]
    fn test_child_read_failure() {
        let mut dev = two_level_device();
        dev.fail_block(50);
        let mut bd = bdev(dev);
        let file = two_level_file();

        let err = ExtentTree::new(&mut bd, BS).find_extent(&file, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_child_bad_magic() {
        let mut dev = two_level_device();
        dev.fill_block(51, 0);
        let mut bd = bdev(dev);
        let file = two_level_file();

        let err = ExtentTree::new(&mut bd, BS).find_extent(&file, 120).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_child_depth_mismatch() {
        let mut dev = two_level_device();
        write_index(dev.block_mut(50), 1, &[(0, 51)]);
        let mut bd = bdev(dev);
        let file = two_level_file();

        let err = ExtentTree::new(&mut bd, BS).find_extent(&file, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_child_depth_field_overflow() {
        let mut dev = two_level_device();
        dev.block_mut(50)[6..8].copy_from_slice(&u16::MAX.to_le_bytes());
        let mut bd = bdev(dev);
        let file = two_level_file();

        let err = ExtentTree::new(&mut bd, BS).find_extent(&file, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(bd.outstanding_buffers(), 0);
    }

    #[test]
    fn test_root_entry_count_over_capacity() {
        let mut bd = bdev(MockDevice::new(4));
        let mut root = root_leaf(&[(0, 1, 9)]);
        root[2..4].copy_from_slice(&5u16.to_le_bytes());
        let file = extent_file(BS as u64, root);

        let err = ExtentTree::new(&mut bd, BS).find_extent(&file, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_high_physical_bits() {
        let mut bd = bdev(MockDevice::new(4));
        let file = extent_file(BS as u64, root_leaf(&[(0, 1, 0x0001_0000_0010)]));

        let path = ExtentTree::new(&mut bd, BS).find_extent(&file, 0).unwrap().unwrap();
        assert_eq!(path.extent().unwrap().physical_start, 0x0001_0000_0010);
    }
}
