//! HTree directory index lookup
//!
//! Walks the hashed directory index from the root block (directory block 0)
//! down to the leaf block whose hash range covers a name, and continues to
//! the next leaf when a run of equal hashes spills over a block boundary.
//!
//! The index is at most two levels deep (root plus one level of interior
//! nodes), so [`HTreeLookupInfo`] holds a fixed two-entry path.
//!
//! 对应 lwext4 的 ext4_dir_idx.c（只读部分）

use crate::{
    block::{BlockBuf, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::{Ext4Volume, FileNode},
    types::{HTreeCount, HTreeEntry, HTreeRootInfo},
};
use log::*;

use super::hash::{htree_hash, HashVersion, EXT2_HTREE_TEA};
use super::lookup::DirMatch;
use super::scan::{DirBlockScanner, DirSearch};

/// One level of an HTree lookup path
#[derive(Debug, Default)]
pub struct HTreeLookupLevel {
    buf: Option<BlockBuf>,
    entries_offset: usize,
    current: usize,
    count: u16,
}

impl HTreeLookupLevel {
    /// Directory block holding this level's entries
    pub fn buffer(&self) -> Option<&BlockBuf> {
        self.buf.as_ref()
    }

    /// Byte offset of the entry array (slot 0) within the block
    pub fn entries_offset(&self) -> usize {
        self.entries_offset
    }

    /// Slot chosen at this level
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of valid entries, slot 0 included
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Entry at `slot`
    ///
    /// Slot 0 overlays the limit/count header; only its block field is
    /// meaningful.
    pub fn entry(&self, slot: usize) -> Result<HTreeEntry> {
        let data = match &self.buf {
            Some(buf) => buf.data(),
            None => return Err(Error::new(ErrorKind::InvalidInput, "HTree level not loaded")),
        };
        let off = self.entries_offset + slot * EXT4_HTREE_ENTRY_SIZE;
        HTreeEntry::parse(data.get(off..).unwrap_or(&[]))
    }

    /// Entry at the current slot
    pub fn current_entry(&self) -> Result<HTreeEntry> {
        self.entry(self.current)
    }
}

/// Path from the HTree root to a leaf
///
/// Owns one block buffer per level; dropping it (or calling
/// [`release`](Self::release)) returns them.
#[derive(Debug, Default)]
pub struct HTreeLookupInfo {
    levels: [HTreeLookupLevel; EXT4_HTREE_MAX_LEVELS],
    levels_used: usize,
}

impl HTreeLookupInfo {
    /// Number of populated levels (1 or 2)
    pub fn levels_used(&self) -> usize {
        self.levels_used
    }

    /// Level `depth`, 0 being the root
    pub fn level(&self, depth: usize) -> Option<&HTreeLookupLevel> {
        self.levels[..self.levels_used].get(depth)
    }

    /// Directory logical block of the leaf the path currently points at
    pub fn leaf_block(&self) -> Result<u32> {
        match self.levels_used.checked_sub(1) {
            Some(deepest) => Ok(self.levels[deepest].current_entry()?.block),
            None => Err(Error::new(ErrorKind::InvalidInput, "Empty HTree lookup path")),
        }
    }

    /// Release every held buffer
    pub fn release(self) {}
}

/// Result of [`HTree::find_leaf`]
#[derive(Debug)]
pub struct HTreeLeaf {
    /// Major hash of the name (low bit clear)
    pub hash: u32,
    /// Effective hash version, unsigned offset applied
    pub hash_version: HashVersion,
    /// Path to the leaf
    pub info: HTreeLookupInfo,
}

/// HTree lookup on one volume
pub struct HTree<'a, D> {
    vol: &'a mut Ext4Volume<D>,
}

impl<'a, D: BlockDevice> HTree<'a, D> {
    /// Bind to a volume
    pub fn new(vol: &'a mut Ext4Volume<D>) -> Self {
        Self { vol }
    }

    /// Entry capacity of the root block for a given root-info length
    fn root_limit(&self, info_len: u8) -> usize {
        let config = self.vol.config();
        let mut space = config.block_size as usize
            - dir_rec_len(1)
            - dir_rec_len(2)
            - info_len as usize;
        if config.has_metadata_csum() {
            space -= EXT4_HTREE_TAIL_SIZE;
        }
        space / EXT4_HTREE_ENTRY_SIZE
    }

    /// Read the count header of a level and check it fits the block
    fn read_count(buf: &BlockBuf, entries_offset: usize) -> Result<HTreeCount> {
        let data = buf.data();
        let count = HTreeCount::parse(data.get(entries_offset..).unwrap_or(&[]))?;
        if count.count == 0 || count.count > count.limit {
            error!(
                "[HTREE] block {}: bad entry count {} (limit {})",
                buf.lba(),
                count.count,
                count.limit
            );
            return Err(Error::new(ErrorKind::Corrupted, "Bad HTree entry count"));
        }
        if entries_offset + count.limit as usize * EXT4_HTREE_ENTRY_SIZE > data.len() {
            error!("[HTREE] block {}: limit {} overruns block", buf.lba(), count.limit);
            return Err(Error::new(ErrorKind::Corrupted, "HTree limit overruns block"));
        }
        Ok(count)
    }

    /// Read an interior index node as a path level positioned at slot 0
    fn read_node(&mut self, dir: &mut FileNode, logical_block: u32) -> Result<HTreeLookupLevel> {
        let buf = self.vol.read_dir_block(dir, logical_block)?;
        let count = Self::read_count(&buf, EXT4_HTREE_NODE_ENTRIES_OFFSET)?;
        Ok(HTreeLookupLevel {
            buf: Some(buf),
            entries_offset: EXT4_HTREE_NODE_ENTRIES_OFFSET,
            current: 0,
            count: count.count,
        })
    }

    /// Descend from the root to the leaf whose hash range covers `name`
    ///
    /// At every level the rightmost entry whose hash is `<=` the name's
    /// major hash is chosen; slot 0 is never compared and covers everything
    /// below slot 1.
    ///
    /// # Errors
    ///
    /// - `Unsupported` - unknown hash version, or more than one index level
    /// - `Corrupted` - root limit does not match the block size, or a zero or
    ///   over-limit entry count
    /// - `InvalidInput` - empty or over-long name
    /// - `Io` - a directory block could not be read
    pub fn find_leaf(&mut self, dir: &mut FileNode, name: &[u8]) -> Result<HTreeLeaf> {
        let root = self.vol.read_dir_block(dir, 0)?;
        let root_info = HTreeRootInfo::parse(root.data())?;

        if root_info.hash_version > EXT2_HTREE_TEA {
            error!(
                "[HTREE] directory inode {}: unrecognised hash version {}",
                dir.ino(),
                root_info.hash_version
            );
            return Err(Error::new(ErrorKind::Unsupported, "Unrecognised HTree hash version"));
        }
        let hash_version = HashVersion::from_raw(
            root_info.hash_version + self.vol.config().unsigned_hash_offset(),
        )
        .ok_or(Error::new(ErrorKind::Unsupported, "Unrecognised HTree hash version"))?;

        let seed = self.vol.config().hash_seed;
        let (hash, _) = htree_hash(name, Some(&seed), hash_version)?;

        let index_levels = root_info.indirect_levels as usize;
        if index_levels >= EXT4_HTREE_MAX_LEVELS {
            error!(
                "[HTREE] directory inode {}: {} index levels",
                dir.ino(),
                root_info.indirect_levels
            );
            return Err(Error::new(ErrorKind::Unsupported, "HTree too deep"));
        }

        let entries_offset = EXT4_HTREE_ROOT_INFO_OFFSET + root_info.info_len as usize;
        let root_count = Self::read_count(&root, entries_offset)?;
        if root_count.limit as usize != self.root_limit(root_info.info_len) {
            error!(
                "[HTREE] directory inode {}: root limit {} != {}",
                dir.ino(),
                root_count.limit,
                self.root_limit(root_info.info_len)
            );
            return Err(Error::new(ErrorKind::Corrupted, "HTree root limit mismatch"));
        }

        trace!(
            "[HTREE] inode {} name {:?} hash {:#010x} version {:?}",
            dir.ino(),
            core::str::from_utf8(name),
            hash,
            hash_version
        );

        let mut info = HTreeLookupInfo::default();
        let mut level = HTreeLookupLevel {
            buf: Some(root),
            entries_offset,
            current: 0,
            count: root_count.count,
        };

        for depth in 0..=index_levels {
            level.current = Self::search(&level, hash)?;
            let child = level.current_entry()?.block;
            info.levels[depth] = level;
            info.levels_used = depth + 1;

            if depth == index_levels {
                break;
            }
            level = self.read_node(dir, child)?;
        }

        debug!(
            "[HTREE] inode {}: hash {:#010x} -> leaf {}",
            dir.ino(),
            hash,
            info.leaf_block()?
        );
        Ok(HTreeLeaf {
            hash,
            hash_version,
            info,
        })
    }

    /// Binary search for the rightmost slot in `1..count` with hash `<= hash`
    ///
    /// Returns 0 when every compared hash is greater.
    fn search(level: &HTreeLookupLevel, hash: u32) -> Result<usize> {
        let mut lo = 1usize;
        let mut hi = level.count as usize;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if level.entry(mid)?.hash > hash {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo - 1)
    }

    /// Move `info` to the next leaf if it may still hold entries for `hash`
    ///
    /// Returns `false` once the root is exhausted, or when the next subtree
    /// starts with a different hash. A next hash with its low bit set marks
    /// a collision run continuing from the previous block; when `hash`
    /// itself has the low bit set the next leaf is always visited.
    pub fn check_next(
        &mut self,
        dir: &mut FileNode,
        hash: u32,
        info: &mut HTreeLookupInfo,
    ) -> Result<bool> {
        let Some(mut depth) = info.levels_used.checked_sub(1) else {
            return Ok(false);
        };

        loop {
            let level = &mut info.levels[depth];
            level.current += 1;
            if level.current < level.count as usize {
                break;
            }
            if depth == 0 {
                return Ok(false);
            }
            depth -= 1;
        }

        let next_hash = info.levels[depth].current_entry()?.hash;
        if hash & 1 == 0 && hash != next_hash & !1 {
            trace!("[HTREE] next hash {:#010x} ends run of {:#010x}", next_hash, hash);
            return Ok(false);
        }

        while depth + 1 < info.levels_used {
            let child = info.levels[depth].current_entry()?.block;
            depth += 1;
            info.levels[depth] = self.read_node(dir, child)?;
        }

        trace!("[HTREE] continuing to leaf {}", info.leaf_block()?);
        Ok(true)
    }

    /// Look `name` up through the index
    ///
    /// Scans the leaf chosen by [`find_leaf`](Self::find_leaf) and, on a
    /// miss, each following leaf [`check_next`](Self::check_next) admits.
    /// A match keeps its leaf buffer alive inside the returned [`DirMatch`];
    /// every other buffer is released before returning.
    pub fn lookup<S: DirBlockScanner>(
        &mut self,
        dir: &mut FileNode,
        name: &[u8],
        scanner: &S,
        search: &mut DirSearch,
    ) -> Result<Option<DirMatch>> {
        let HTreeLeaf { hash, mut info, .. } = self.find_leaf(dir, name)?;
        let block_size = self.vol.block_size() as u64;

        loop {
            let logical_block = info.leaf_block()?;
            let buf = self.vol.read_dir_block(dir, logical_block)?;
            search.reset_for_block(logical_block as u64 * block_size);

            if let Some(entry) = scanner.scan(buf.data(), name, search)? {
                info.release();
                debug!(
                    "[HTREE] inode {}: found in leaf {} -> inode {}",
                    dir.ino(),
                    logical_block,
                    entry.inode
                );
                return Ok(Some(DirMatch::new(entry, buf, logical_block, search.offset)));
            }
            drop(buf);

            if !self.check_next(dir, hash, &mut info)? {
                debug!("[HTREE] inode {}: {:?} not found", dir.ino(), core::str::from_utf8(name));
                return Ok(None);
            }
        }
    }
}
