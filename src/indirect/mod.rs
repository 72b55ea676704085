//! 间接块映射（ext2/ext3 风格的块指针）

mod mapper;

pub use mapper::IndirectBlockMapper;
