//! 块设备抽象
//!
//! block/device.rs 定义只读的 `BlockDevice` 接口和 `BlockDev` 包装器，
//! 通过 `bread` 按文件系统块号读取，先查 LRU 块缓存，未命中再访问设备。

//! block/buf.rs 提供 `BlockBuf`，对某个已读块的引用，drop 时自动归还。

mod buf;
mod device;

pub use buf::BlockBuf;
pub use device::{BlockDev, BlockDevice};
