//! 目录块扫描
//!
//! 在单个目录块中按名称查找目录项，同时为可能随后发生的插入记录空闲槽位
//! （`SearchSlot`）。HTree 查找和线性查找都通过 [`DirBlockScanner`] 调用它。

use crate::consts::*;
use crate::error::Result;
use byteorder::{ByteOrder, LittleEndian};
use log::*;

/// 空闲槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    /// 还没有找到足够的空间
    #[default]
    None,
    /// 压缩当前块中的若干项后可以得到足够空间
    Compact,
    /// 找到了单个足够大的空闲项
    Found,
}

/// 插入新目录项所需的空闲槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchSlot {
    /// 状态
    pub status: SlotStatus,
    /// 槽位在目录中的字节偏移
    pub offset: Option<u64>,
    /// 槽位大小（字节）
    pub size: u32,
    /// 当前块中累计的空闲空间
    pub free_space: u32,
    /// 新目录项需要的空间
    pub needed: u32,
}

/// 一次目录查找的进度
///
/// 所有偏移都是目录内的字节偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirSearch {
    /// 当前项在块内的偏移
    pub entry_offset_in_block: u32,
    /// 当前项的偏移
    pub offset: u64,
    /// 前一项的偏移
    pub prev_offset: u64,
    /// 最后一个有效项之后的偏移
    pub end_useful: u64,
    /// 空闲槽位
    pub slot: SearchSlot,
}

impl DirSearch {
    /// 为名称长度为 `name_len` 的查找创建进度
    pub fn new(name_len: usize) -> Self {
        Self {
            slot: SearchSlot {
                needed: dir_rec_len(name_len) as u32,
                ..SearchSlot::default()
            },
            ..Self::default()
        }
    }

    /// 开始扫描起始偏移为 `block_offset` 的目录块
    ///
    /// 还没有找到任何槽位时，丢弃上一块累计的空闲空间。
    pub fn reset_for_block(&mut self, block_offset: u64) {
        self.entry_offset_in_block = 0;
        self.offset = block_offset;
        self.prev_offset = block_offset;
        self.end_useful = block_offset;
        if self.slot.status == SlotStatus::None {
            self.slot.offset = None;
            self.slot.free_space = 0;
        }
    }
}

/// 命中的目录项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntryRef {
    /// inode 号
    pub inode: u32,
    /// 记录长度
    pub rec_len: u16,
    /// 名称长度
    pub name_len: u8,
    /// 文件类型
    pub file_type: u8,
    /// 在块内的偏移
    pub offset_in_block: usize,
}

impl DirEntryRef {
    /// 从块数据中取出名称
    pub fn name<'a>(&self, block: &'a [u8]) -> &'a [u8] {
        let start = self.offset_in_block + EXT4_DIR_ENTRY_MIN_LEN;
        &block[start..start + self.name_len as usize]
    }
}

/// 目录块扫描器
pub trait DirBlockScanner {
    /// 在 `block` 中查找 `name`，从 `search.entry_offset_in_block` 处开始
    ///
    /// 命中时 `search` 停在命中的项上；未命中时 `search` 走到块尾。
    fn scan(&self, block: &[u8], name: &[u8], search: &mut DirSearch) -> Result<Option<DirEntryRef>>;
}

/// 顺序扫描目录项的扫描器
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanner;

impl DirBlockScanner for LinearScanner {
    fn scan(&self, block: &[u8], name: &[u8], search: &mut DirSearch) -> Result<Option<DirEntryRef>> {
        let bsize = block.len();
        let top = bsize.saturating_sub(dir_rec_len(0));
        let mut off = search.entry_offset_in_block as usize;

        while off < top {
            let ino = LittleEndian::read_u32(&block[off..]);
            let rec_len = LittleEndian::read_u16(&block[off + 4..]);
            let name_len = block[off + 6];
            let file_type = block[off + 7];
            let reclen = rec_len as usize;

            if reclen < EXT4_DIR_ENTRY_MIN_LEN
                || off + reclen > bsize
                || (ino != 0 && dir_rec_len(name_len as usize) > reclen)
            {
                warn!("[DIR] mangled entry at offset {} (rec_len {})", search.offset, rec_len);
                let skip = bsize - off;
                search.offset += skip as u64;
                off += skip;
                search.entry_offset_in_block = off as u32;
                continue;
            }

            let slot = &mut search.slot;
            if slot.status != SlotStatus::Found {
                let mut size = reclen;
                if ino != 0 {
                    size -= dir_rec_len(name_len as usize);
                }
                let size = size as u32;
                if size > 0 {
                    if size >= slot.needed {
                        slot.status = SlotStatus::Found;
                        slot.offset = Some(search.offset);
                        slot.size = rec_len as u32;
                    } else if slot.status == SlotStatus::None {
                        slot.free_space += size;
                        let start = *slot.offset.get_or_insert(search.offset);
                        if slot.free_space >= slot.needed {
                            slot.status = SlotStatus::Compact;
                            slot.size = (search.offset + reclen as u64 - start) as u32;
                        }
                    }
                }
            }

            if ino != 0 && name_len as usize == name.len() {
                let start = off + EXT4_DIR_ENTRY_MIN_LEN;
                if &block[start..start + name.len()] == name {
                    trace!("[DIR] found {:?} at offset {}", core::str::from_utf8(name), search.offset);
                    return Ok(Some(DirEntryRef {
                        inode: ino,
                        rec_len,
                        name_len,
                        file_type,
                        offset_in_block: off,
                    }));
                }
            }

            search.prev_offset = search.offset;
            search.offset += reclen as u64;
            off += reclen;
            search.entry_offset_in_block = off as u32;
            if ino != 0 {
                search.end_useful = search.offset;
            }
        }

        Ok(None)
    }
}
