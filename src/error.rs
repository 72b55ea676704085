//! 错误类型定义
//!
//! 提供 extent 树与 HTree 查找路径的错误类型。
//!
//! "没有找到" 不是错误：`find_extent` 对非 extent 映射的文件返回 `Ok(None)`，
//! 目录查找未命中同样返回 `Ok(None)`。

use core::fmt;

/// 查找操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（块读取失败）
    Io,
    /// 无效参数
    InvalidInput,
    /// 文件系统损坏（磁盘结构不满足不变量）
    Corrupted,
    /// 对象不存在
    NotFound,
    /// 不支持的格式或特性
    Unsupported,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为磁盘结构问题（损坏或不支持）
    ///
    /// 目录查找在这类错误上可以退回线性扫描，I/O 错误则不行。
    pub const fn is_format_problem(&self) -> bool {
        matches!(self.kind, ErrorKind::Corrupted | ErrorKind::Unsupported)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
