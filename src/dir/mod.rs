//! 目录查找模块
//!
//! ## 模块结构
//!
//! - `hash` - HTree 哈希算法（legacy / half-MD4 / TEA 及其无符号变体）
//! - `htree` - HTree 索引下降：`find_leaf`、`check_next`、`lookup`
//! - `scan` - 单个目录块内的目录项扫描与插入槽位记录
//! - `lookup` - `Ext4Volume::find_entry()`：HTree 优先，必要时退回线性扫描

pub mod hash;
mod htree;
mod lookup;
mod scan;

pub use hash::{htree_hash, HashVersion};
pub use htree::{HTree, HTreeLeaf, HTreeLookupInfo, HTreeLookupLevel};
pub use lookup::{is_indexed, DirMatch};
pub use scan::{DirBlockScanner, DirEntryRef, DirSearch, LinearScanner, SearchSlot, SlotStatus};
