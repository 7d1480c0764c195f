use crate::byte_buf::ByteBuf;
use crate::error::BufferError;

/// 与父缓冲共享游标的反序视图。
///
/// # 设计背景（Why）
/// - 多字节访问器默认大端序；个别协议字段要求小端落盘时，调用方可以
///   临时借出反序视图，而无需在每个调用点手写字节交换。
/// - 视图只是对父缓冲的独占借用：没有独立游标、没有额外分配，
///   借用结束即归还，父缓冲的状态演进完全连续。
///
/// # 契约说明（What）
/// - 单字节操作与字节序无关，不在此处重复暴露；
/// - 每个多字节访问器等价于父缓冲上对应的 `_le` 变体。
pub struct SwappedBuf<'a> {
    inner: &'a mut ByteBuf,
}

impl<'a> SwappedBuf<'a> {
    pub(crate) fn new(inner: &'a mut ByteBuf) -> Self {
        Self { inner }
    }
}

/// 把反序视图的访问器逐一委托到父缓冲的小端变体。
macro_rules! swapped_accessors {
    ($(
        $ty:ty => $get:ident / $get_le:ident, $set:ident / $set_le:ident,
                  $read:ident / $read_le:ident, $write:ident / $write_le:ident;
    )*) => {
        impl SwappedBuf<'_> {
            $(
                #[doc = concat!("反序读取绝对索引处的 `", stringify!($ty), "`。")]
                pub fn $get(&self, index: usize) -> Result<$ty, BufferError> {
                    self.inner.$get_le(index)
                }

                #[doc = concat!("反序写入绝对索引处的 `", stringify!($ty), "`。")]
                pub fn $set(&mut self, index: usize, value: $ty) -> Result<(), BufferError> {
                    self.inner.$set_le(index, value)
                }

                #[doc = concat!("反序顺序读取 `", stringify!($ty), "`，推进父缓冲的读游标。")]
                pub fn $read(&mut self) -> Result<$ty, BufferError> {
                    self.inner.$read_le()
                }

                #[doc = concat!("反序顺序写入 `", stringify!($ty), "`，推进父缓冲的写游标。")]
                pub fn $write(&mut self, value: $ty) -> Result<(), BufferError> {
                    self.inner.$write_le(value)
                }
            )*
        }
    };
}

swapped_accessors! {
    u16 => get_u16 / get_u16_le, set_u16 / set_u16_le, read_u16 / read_u16_le, write_u16 / write_u16_le;
    i16 => get_i16 / get_i16_le, set_i16 / set_i16_le, read_i16 / read_i16_le, write_i16 / write_i16_le;
    u32 => get_u32 / get_u32_le, set_u32 / set_u32_le, read_u32 / read_u32_le, write_u32 / write_u32_le;
    i32 => get_i32 / get_i32_le, set_i32 / set_i32_le, read_i32 / read_i32_le, write_i32 / write_i32_le;
    u64 => get_u64 / get_u64_le, set_u64 / set_u64_le, read_u64 / read_u64_le, write_u64 / write_u64_le;
    i64 => get_i64 / get_i64_le, set_i64 / set_i64_le, read_i64 / read_i64_le, write_i64 / write_i64_le;
    f32 => get_f32 / get_f32_le, set_f32 / set_f32_le, read_f32 / read_f32_le, write_f32 / write_f32_le;
    f64 => get_f64 / get_f64_le, set_f64 / set_f64_le, read_f64 / read_f64_le, write_f64 / write_f64_le;
}

impl SwappedBuf<'_> {
    /// 反序读取 24 位无符号整数。
    pub fn get_u24(&self, index: usize) -> Result<u32, BufferError> {
        self.inner.get_u24_le(index)
    }

    /// 反序读取 24 位有符号整数。
    pub fn get_i24(&self, index: usize) -> Result<i32, BufferError> {
        self.inner.get_i24_le(index)
    }

    /// 反序写入 24 位整数。
    pub fn set_u24(&mut self, index: usize, value: u32) -> Result<(), BufferError> {
        self.inner.set_u24_le(index, value)
    }

    /// 反序顺序读取 24 位无符号整数。
    pub fn read_u24(&mut self) -> Result<u32, BufferError> {
        self.inner.read_u24_le()
    }

    /// 反序顺序读取 24 位有符号整数。
    pub fn read_i24(&mut self) -> Result<i32, BufferError> {
        self.inner.read_i24_le()
    }

    /// 反序顺序写入 24 位整数。
    pub fn write_u24(&mut self, value: u32) -> Result<(), BufferError> {
        self.inner.write_u24_le(value)
    }
}
