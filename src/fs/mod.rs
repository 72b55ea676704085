//! 文件系统层
//!
//! 这个模块提供查找路径所需的文件系统对象：配置、文件节点和卷。

mod config;
mod inode;
mod volume;

pub use config::FsConfig;
pub use inode::FileNode;
pub use volume::Ext4Volume;
