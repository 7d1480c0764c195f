use alloc::sync::Arc;
use core::fmt;

use crate::allocator::BufAllocator;
use crate::error::BufferError;
use crate::storage::SharedStorage;
use crate::swapped::SwappedBuf;

/// `ensure_writable_partial` 的四态结论。
///
/// # 契约说明（What）
/// - `Enough`：剩余可写空间已满足需求，容量未变。
/// - `AtMaxCapacity`：需求超出上限且无法（或不允许）再扩，容量未变。
/// - `Grew`：按分配器策略完成了一次常规扩容。
/// - `ForcedToMax`：需求超出上限，但调用方要求尽力而为，容量被顶到上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritableCheck {
    /// 空间足够，无需扩容。
    Enough,
    /// 已到容量上限，需求无法满足。
    AtMaxCapacity,
    /// 常规扩容完成。
    Grew,
    /// 被强制顶到容量上限。
    ForcedToMax,
}

/// 双游标、引用计数、可动态扩容的字节容器。
///
/// # 设计背景（Why）
/// - 管线各级 Handler 之间以缓冲为载体传递字节，读写各持一根游标免去
///   显式 flip；切片与复制视图共享同一后备存储，编解码过程零拷贝。
/// - 生命周期由显式 `retain`/`release` 驱动：消息可能在执行器之间跳转，
///   由最后一个持有者归还内存，而不绑定任何一次事件回调的作用域。
///
/// # 解析逻辑（How）
/// - 结构体是"视图"：`origin` 与可选的窗口长度把视图映射进共享存储；
///   根缓冲与复制视图窗口从 0 开始且可扩容，切片窗口固定。
/// - 游标恒满足 `0 <= reader <= writer <= capacity <= max_capacity`，
///   每个公开操作的入口都先做存活与边界检查，失败路径不改动任何状态。
///
/// # 契约说明（What）
/// - 多字节访问器默认大端序，另有成对的 `_le` 变体；`swapped()` 提供
///   共享游标的反序视图。
/// - 内容的变更不做内部同步：跨线程传递缓冲需经由管线移交或外部同步，
///   只有引用计数本身是原子的。
pub struct ByteBuf {
    alloc: Arc<dyn BufAllocator>,
    storage: Arc<SharedStorage>,
    /// 视图在共享存储内的起点；根缓冲与复制视图恒为 0。
    origin: usize,
    /// 切片的固定窗口长度；`None` 表示视图容量跟随存储长度。
    window: Option<usize>,
    reader_index: usize,
    writer_index: usize,
    marked_reader: usize,
    marked_writer: usize,
    max_capacity: usize,
}

impl ByteBuf {
    /// 由分配器调用的根缓冲构造入口。
    pub(crate) fn fresh(
        alloc: Arc<dyn BufAllocator>,
        initial_capacity: usize,
        max_capacity: usize,
    ) -> Self {
        Self {
            alloc,
            storage: Arc::new(SharedStorage::new(initial_capacity)),
            origin: 0,
            window: None,
            reader_index: 0,
            writer_index: 0,
            marked_reader: 0,
            marked_writer: 0,
            max_capacity,
        }
    }

    /// 当前容量：切片为固定窗口，其余视图跟随存储长度。
    pub fn capacity(&self) -> usize {
        self.window.unwrap_or_else(|| self.storage.len())
    }

    /// 容量上限。
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// 读游标。
    pub fn reader_index(&self) -> usize {
        self.reader_index
    }

    /// 写游标。
    pub fn writer_index(&self) -> usize {
        self.writer_index
    }

    /// 设定读游标；必须落在 `[0, writer]`。
    pub fn set_reader_index(&mut self, reader: usize) -> Result<(), BufferError> {
        if reader > self.writer_index {
            return Err(BufferError::Index {
                index: reader,
                length: 0,
                capacity: self.writer_index,
            });
        }
        self.reader_index = reader;
        Ok(())
    }

    /// 设定写游标；必须落在 `[reader, capacity]`。
    pub fn set_writer_index(&mut self, writer: usize) -> Result<(), BufferError> {
        if writer < self.reader_index || writer > self.capacity() {
            return Err(BufferError::Index {
                index: writer,
                length: 0,
                capacity: self.capacity(),
            });
        }
        self.writer_index = writer;
        Ok(())
    }

    /// 可读字节数（`writer - reader`）。
    pub fn readable_bytes(&self) -> usize {
        self.writer_index - self.reader_index
    }

    /// 剩余可写字节数（`capacity - writer`）。
    pub fn writable_bytes(&self) -> usize {
        self.capacity() - self.writer_index
    }

    /// 扩容后最多还能写入的字节数（`max_capacity - writer`）。
    pub fn max_writable_bytes(&self) -> usize {
        self.max_capacity - self.writer_index
    }

    /// 是否还有可读内容。
    pub fn is_readable(&self) -> bool {
        self.writer_index > self.reader_index
    }

    /// 是否还有可写空间。
    pub fn is_writable(&self) -> bool {
        self.capacity() > self.writer_index
    }

    /// 当前引用计数；0 表示内容已被归还。
    pub fn ref_count(&self) -> usize {
        self.storage.ref_count()
    }

    /// 计数加一。已释放的缓冲不可复活。
    pub fn retain(&self) -> Result<(), BufferError> {
        self.storage.retain()
    }

    /// 计数减一；返回 `true` 表示本次释放触达 0，内容已归还。
    pub fn release(&self) -> Result<bool, BufferError> {
        self.storage.release()
    }

    /// 记录当前读游标。
    pub fn mark_reader(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        self.marked_reader = self.reader_index;
        Ok(())
    }

    /// 回到上次记录的读游标；压缩后的标记已被同步平移。
    pub fn reset_reader(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if self.marked_reader > self.writer_index {
            return Err(BufferError::Index {
                index: self.marked_reader,
                length: 0,
                capacity: self.writer_index,
            });
        }
        self.reader_index = self.marked_reader;
        Ok(())
    }

    /// 记录当前写游标。
    pub fn mark_writer(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        self.marked_writer = self.writer_index;
        Ok(())
    }

    /// 回到上次记录的写游标。
    pub fn reset_writer(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if self.marked_writer < self.reader_index {
            return Err(BufferError::Index {
                index: self.marked_writer,
                length: 0,
                capacity: self.reader_index,
            });
        }
        self.writer_index = self.marked_writer;
        Ok(())
    }

    /// 游标归零，容量与内容保持不变。
    pub fn clear(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        self.reader_index = 0;
        self.writer_index = 0;
        Ok(())
    }

    /// 跳过 `len` 个可读字节。
    pub fn skip(&mut self, len: usize) -> Result<(), BufferError> {
        self.check_readable(len)?;
        self.reader_index += len;
        Ok(())
    }

    /// 压缩：把 `[reader, writer)` 搬到窗口起点，读游标归零。
    ///
    /// 标记随平移量同步左移并钳制在新写游标之内，保证其后的 `reset_*`
    /// 要么落回有效窗口、要么落在 0，绝不悬在写游标之外。
    pub fn discard_read(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if self.reader_index == 0 {
            return Ok(());
        }
        let shift = self.reader_index;
        if self.reader_index != self.writer_index {
            let len = self.writer_index - self.reader_index;
            self.storage
                .copy_within(self.origin + shift, self.origin, len);
            self.writer_index -= shift;
            self.reader_index = 0;
        } else {
            self.reader_index = 0;
            self.writer_index = 0;
        }
        self.adjust_markers(shift);
        Ok(())
    }

    /// 条件压缩：仅当读游标越过容量一半时才搬移。
    ///
    /// 门槛摊薄了搬移成本：小步读取、大步写出的阶段不必每次触碰都搬字节。
    pub fn discard_some_read(&mut self) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if self.reader_index == 0 {
            return Ok(());
        }
        if self.reader_index == self.writer_index {
            let shift = self.reader_index;
            self.reader_index = 0;
            self.writer_index = 0;
            self.adjust_markers(shift);
            return Ok(());
        }
        if self.reader_index >= self.capacity() >> 1 {
            let shift = self.reader_index;
            let len = self.writer_index - self.reader_index;
            self.storage
                .copy_within(self.origin + shift, self.origin, len);
            self.writer_index -= shift;
            self.reader_index = 0;
            self.adjust_markers(shift);
        }
        Ok(())
    }

    /// 确保至少还能写入 `min_writable` 字节，必要时按分配器策略扩容。
    pub fn ensure_writable(&mut self, min_writable: usize) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if min_writable <= self.writable_bytes() {
            return Ok(());
        }
        if min_writable > self.max_capacity - self.writer_index {
            return Err(BufferError::Capacity {
                required: self.writer_index + min_writable,
                max_capacity: self.max_capacity,
            });
        }
        let new_capacity = self
            .alloc
            .calculate_new_capacity(self.writer_index + min_writable, self.max_capacity)?;
        self.storage.grow_to(self.origin + new_capacity);
        Ok(())
    }

    /// `ensure_writable` 的尽力而为变体，以四态结论代替错误返回。
    ///
    /// # 契约说明（What）
    /// - 需求可满足时行为与 `ensure_writable` 一致，返回 `Grew`；
    /// - 需求超出上限：`force` 为假或容量已到上限时不做任何变更，
    ///   返回 `AtMaxCapacity`；`force` 为真且尚有余地时容量顶到上限，
    ///   返回 `ForcedToMax`。
    pub fn ensure_writable_partial(
        &mut self,
        min_writable: usize,
        force: bool,
    ) -> Result<WritableCheck, BufferError> {
        self.ensure_accessible()?;
        if min_writable <= self.writable_bytes() {
            return Ok(WritableCheck::Enough);
        }
        if min_writable > self.max_capacity - self.writer_index {
            if !force || self.capacity() == self.max_capacity {
                return Ok(WritableCheck::AtMaxCapacity);
            }
            self.storage.grow_to(self.origin + self.max_capacity);
            return Ok(WritableCheck::ForcedToMax);
        }
        let new_capacity = self
            .alloc
            .calculate_new_capacity(self.writer_index + min_writable, self.max_capacity)?;
        self.storage.grow_to(self.origin + new_capacity);
        Ok(WritableCheck::Grew)
    }

    /// 读取绝对索引处的一段字节，不移动游标。
    pub fn get_bytes(&self, index: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        self.check_index(index, dst.len())?;
        self.storage.copy_to(self.origin + index, dst);
        Ok(())
    }

    /// 写入绝对索引处的一段字节，不移动游标。
    pub fn set_bytes(&mut self, index: usize, src: &[u8]) -> Result<(), BufferError> {
        self.check_index(index, src.len())?;
        self.storage.copy_from(self.origin + index, src);
        Ok(())
    }

    /// 顺序读出 `dst.len()` 个字节并推进读游标。
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), BufferError> {
        self.check_readable(dst.len())?;
        self.storage.copy_to(self.origin + self.reader_index, dst);
        self.reader_index += dst.len();
        Ok(())
    }

    /// 顺序写入一段字节并推进写游标，必要时扩容。
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<(), BufferError> {
        self.ensure_writable(src.len())?;
        self.storage.copy_from(self.origin + self.writer_index, src);
        self.writer_index += src.len();
        Ok(())
    }

    /// 从源缓冲转移 `len` 个可读字节到本缓冲，同步推进双方游标。
    pub fn write_buf(&mut self, src: &mut ByteBuf, len: usize) -> Result<(), BufferError> {
        src.check_readable(len)?;
        self.ensure_writable(len)?;
        let mut staging = alloc::vec![0u8; len];
        src.read_bytes(&mut staging)?;
        self.storage
            .copy_from(self.origin + self.writer_index, &staging);
        self.writer_index += len;
        Ok(())
    }

    /// 定位转移：把 `[index, index + len)` 写入目标缓冲的写游标处。
    pub fn get_buf(&self, index: usize, dst: &mut ByteBuf, len: usize) -> Result<(), BufferError> {
        self.check_index(index, len)?;
        let mut staging = alloc::vec![0u8; len];
        self.storage.copy_to(self.origin + index, &mut staging);
        dst.write_bytes(&staging)
    }

    /// 定位转移：从源缓冲读出 `len` 字节写到本缓冲的 `index` 处。
    pub fn set_buf(&mut self, index: usize, src: &mut ByteBuf, len: usize) -> Result<(), BufferError> {
        self.check_index(index, len)?;
        let mut staging = alloc::vec![0u8; len];
        src.read_bytes(&mut staging)?;
        self.storage.copy_from(self.origin + index, &staging);
        Ok(())
    }

    /// 把 `[index, index + len)` 清零，不移动游标。
    pub fn set_zero(&mut self, index: usize, len: usize) -> Result<(), BufferError> {
        self.check_index(index, len)?;
        self.storage.fill_zero(self.origin + index, len);
        Ok(())
    }

    /// 顺序写入 `len` 个零字节。
    pub fn write_zero(&mut self, len: usize) -> Result<(), BufferError> {
        self.ensure_writable(len)?;
        self.storage
            .fill_zero(self.origin + self.writer_index, len);
        self.writer_index += len;
        Ok(())
    }

    /// 深拷贝 `[index, index + len)` 为一个独立缓冲（独立存储、计数为 1）。
    pub fn copy(&self, index: usize, len: usize) -> Result<ByteBuf, BufferError> {
        self.check_index(index, len)?;
        let mut copied = ByteBuf::fresh(Arc::clone(&self.alloc), len, self.max_capacity.max(len));
        let mut staging = alloc::vec![0u8; len];
        self.storage.copy_to(self.origin + index, &mut staging);
        copied.storage.copy_from(0, &staging);
        copied.writer_index = len;
        Ok(copied)
    }

    /// 共享存储的切片视图：窗口 `[index, index + len)`，索引从 0 重新计数。
    ///
    /// 切片在创建时保留一次共享计数，因此释放切片不会动摇父视图的
    /// 最后一个引用；透过切片的写入对父视图立即可见，反之亦然。
    pub fn slice(&self, index: usize, len: usize) -> Result<ByteBuf, BufferError> {
        self.check_index(index, len)?;
        self.storage.retain()?;
        Ok(ByteBuf {
            alloc: Arc::clone(&self.alloc),
            storage: Arc::clone(&self.storage),
            origin: self.origin + index,
            window: Some(len),
            reader_index: 0,
            writer_index: len,
            marked_reader: 0,
            marked_writer: 0,
            max_capacity: len,
        })
    }

    /// 消费 `len` 个可读字节，以切片视图的形式返回。
    pub fn read_slice(&mut self, len: usize) -> Result<ByteBuf, BufferError> {
        self.check_readable(len)?;
        let view = self.slice(self.reader_index, len)?;
        self.reader_index += len;
        Ok(view)
    }

    /// 复制视图：独立游标、共享存储与计数。
    pub fn duplicate(&self) -> Result<ByteBuf, BufferError> {
        self.ensure_accessible()?;
        self.storage.retain()?;
        Ok(ByteBuf {
            alloc: Arc::clone(&self.alloc),
            storage: Arc::clone(&self.storage),
            origin: self.origin,
            window: self.window,
            reader_index: self.reader_index,
            writer_index: self.writer_index,
            marked_reader: self.marked_reader,
            marked_writer: self.marked_writer,
            max_capacity: self.max_capacity,
        })
    }

    /// 在 `[from, to)` 内寻找首个等于 `value` 的字节，返回其绝对索引。
    pub fn index_of(&self, from: usize, to: usize, value: u8) -> Result<Option<usize>, BufferError> {
        if from > to {
            return Err(BufferError::Index {
                index: from,
                length: 0,
                capacity: to,
            });
        }
        self.check_index(from, to - from)?;
        for i in from..to {
            if self.storage.byte_at(self.origin + i) == value {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// 对 `[reader, writer)` 逐字节调用处理器。
    ///
    /// 处理器返回 `false` 时停止，返回首个 `false` 所在的绝对索引；
    /// 全程为 `true` 则返回 `None`。
    pub fn for_each_byte<F>(&self, mut processor: F) -> Result<Option<usize>, BufferError>
    where
        F: FnMut(u8) -> bool,
    {
        self.ensure_accessible()?;
        for i in self.reader_index..self.writer_index {
            if !processor(self.storage.byte_at(self.origin + i)) {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// 共享游标的反序视图：多字节访问按相反字节序落盘。
    pub fn swapped(&mut self) -> SwappedBuf<'_> {
        SwappedBuf::new(self)
    }

    /// 读取绝对索引处的单字节。
    pub fn get_u8(&self, index: usize) -> Result<u8, BufferError> {
        self.check_index(index, 1)?;
        Ok(self.storage.byte_at(self.origin + index))
    }

    /// 读取绝对索引处的有符号单字节。
    pub fn get_i8(&self, index: usize) -> Result<i8, BufferError> {
        Ok(self.get_u8(index)? as i8)
    }

    /// 非零即真。
    pub fn get_bool(&self, index: usize) -> Result<bool, BufferError> {
        Ok(self.get_u8(index)? != 0)
    }

    /// 写入绝对索引处的单字节。
    pub fn set_u8(&mut self, index: usize, value: u8) -> Result<(), BufferError> {
        self.set_bytes(index, &[value])
    }

    /// 写入绝对索引处的有符号单字节。
    pub fn set_i8(&mut self, index: usize, value: i8) -> Result<(), BufferError> {
        self.set_u8(index, value as u8)
    }

    /// 写入布尔值（1/0）。
    pub fn set_bool(&mut self, index: usize, value: bool) -> Result<(), BufferError> {
        self.set_u8(index, value as u8)
    }

    /// 顺序读取单字节。
    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        self.check_readable(1)?;
        let value = self.storage.byte_at(self.origin + self.reader_index);
        self.reader_index += 1;
        Ok(value)
    }

    /// 顺序读取有符号单字节。
    pub fn read_i8(&mut self) -> Result<i8, BufferError> {
        Ok(self.read_u8()? as i8)
    }

    /// 顺序读取布尔值。
    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    /// 顺序写入单字节。
    pub fn write_u8(&mut self, value: u8) -> Result<(), BufferError> {
        self.write_bytes(&[value])
    }

    /// 顺序写入有符号单字节。
    pub fn write_i8(&mut self, value: i8) -> Result<(), BufferError> {
        self.write_u8(value as u8)
    }

    /// 顺序写入布尔值（1/0）。
    pub fn write_bool(&mut self, value: bool) -> Result<(), BufferError> {
        self.write_u8(value as u8)
    }

    /// 读取大端 24 位无符号整数。
    pub fn get_u24(&self, index: usize) -> Result<u32, BufferError> {
        let mut raw = [0u8; 3];
        self.get_bytes(index, &mut raw)?;
        Ok(u32::from_be_bytes([0, raw[0], raw[1], raw[2]]))
    }

    /// 读取小端 24 位无符号整数。
    pub fn get_u24_le(&self, index: usize) -> Result<u32, BufferError> {
        let mut raw = [0u8; 3];
        self.get_bytes(index, &mut raw)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], 0]))
    }

    /// 读取大端 24 位有符号整数，自第 23 位符号扩展。
    pub fn get_i24(&self, index: usize) -> Result<i32, BufferError> {
        Ok(((self.get_u24(index)? << 8) as i32) >> 8)
    }

    /// 读取小端 24 位有符号整数。
    pub fn get_i24_le(&self, index: usize) -> Result<i32, BufferError> {
        Ok(((self.get_u24_le(index)? << 8) as i32) >> 8)
    }

    /// 写入大端 24 位整数（取值的低 24 位）。
    pub fn set_u24(&mut self, index: usize, value: u32) -> Result<(), BufferError> {
        let raw = value.to_be_bytes();
        self.set_bytes(index, &[raw[1], raw[2], raw[3]])
    }

    /// 写入小端 24 位整数。
    pub fn set_u24_le(&mut self, index: usize, value: u32) -> Result<(), BufferError> {
        let raw = value.to_le_bytes();
        self.set_bytes(index, &[raw[0], raw[1], raw[2]])
    }

    /// 顺序读取大端 24 位无符号整数。
    pub fn read_u24(&mut self) -> Result<u32, BufferError> {
        self.check_readable(3)?;
        let value = self.get_u24(self.reader_index)?;
        self.reader_index += 3;
        Ok(value)
    }

    /// 顺序读取小端 24 位无符号整数。
    pub fn read_u24_le(&mut self) -> Result<u32, BufferError> {
        self.check_readable(3)?;
        let value = self.get_u24_le(self.reader_index)?;
        self.reader_index += 3;
        Ok(value)
    }

    /// 顺序读取大端 24 位有符号整数。
    pub fn read_i24(&mut self) -> Result<i32, BufferError> {
        Ok(((self.read_u24()? << 8) as i32) >> 8)
    }

    /// 顺序读取小端 24 位有符号整数。
    pub fn read_i24_le(&mut self) -> Result<i32, BufferError> {
        Ok(((self.read_u24_le()? << 8) as i32) >> 8)
    }

    /// 顺序写入大端 24 位整数。
    pub fn write_u24(&mut self, value: u32) -> Result<(), BufferError> {
        self.ensure_writable(3)?;
        self.set_u24(self.writer_index, value)?;
        self.writer_index += 3;
        Ok(())
    }

    /// 顺序写入小端 24 位整数。
    pub fn write_u24_le(&mut self, value: u32) -> Result<(), BufferError> {
        self.ensure_writable(3)?;
        self.set_u24_le(self.writer_index, value)?;
        self.writer_index += 3;
        Ok(())
    }

    /// 写入大端 24 位有符号整数（取低 24 位）。
    pub fn set_i24(&mut self, index: usize, value: i32) -> Result<(), BufferError> {
        self.set_u24(index, value as u32)
    }

    /// 写入小端 24 位有符号整数。
    pub fn set_i24_le(&mut self, index: usize, value: i32) -> Result<(), BufferError> {
        self.set_u24_le(index, value as u32)
    }

    /// 顺序写入大端 24 位有符号整数。
    pub fn write_i24(&mut self, value: i32) -> Result<(), BufferError> {
        self.write_u24(value as u32)
    }

    /// 顺序写入小端 24 位有符号整数。
    pub fn write_i24_le(&mut self, value: i32) -> Result<(), BufferError> {
        self.write_u24_le(value as u32)
    }

    fn ensure_accessible(&self) -> Result<(), BufferError> {
        if self.storage.ref_count() == 0 {
            return Err(BufferError::Released);
        }
        Ok(())
    }

    fn check_index(&self, index: usize, length: usize) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        let capacity = self.capacity();
        let in_bounds = index
            .checked_add(length)
            .is_some_and(|end| end <= capacity);
        if !in_bounds {
            return Err(BufferError::Index {
                index,
                length,
                capacity,
            });
        }
        Ok(())
    }

    fn check_readable(&self, length: usize) -> Result<(), BufferError> {
        self.ensure_accessible()?;
        if length > self.readable_bytes() {
            return Err(BufferError::Index {
                index: self.reader_index,
                length,
                capacity: self.writer_index,
            });
        }
        Ok(())
    }

    /// 压缩后的标记校正：左移平移量并钳制在新写游标之内。
    fn adjust_markers(&mut self, decrement: usize) {
        self.marked_reader = self
            .marked_reader
            .saturating_sub(decrement)
            .min(self.writer_index);
        self.marked_writer = self
            .marked_writer
            .saturating_sub(decrement)
            .min(self.writer_index);
    }
}

/// 为每个多字节原生类型生成成对的大端/小端访问器。
///
/// 生成四组方法：定位读 `get_*`、定位写 `set_*`、顺序读 `read_*`、
/// 顺序写 `write_*`，各配 `_le` 变体。
macro_rules! primitive_accessors {
    ($(
        $ty:ty => $get:ident, $get_le:ident, $set:ident, $set_le:ident,
                  $read:ident, $read_le:ident, $write:ident, $write_le:ident;
    )*) => {
        impl ByteBuf {
            $(
                #[doc = concat!("读取绝对索引处的大端 `", stringify!($ty), "`，不移动游标。")]
                pub fn $get(&self, index: usize) -> Result<$ty, BufferError> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    self.get_bytes(index, &mut raw)?;
                    Ok(<$ty>::from_be_bytes(raw))
                }

                #[doc = concat!("读取绝对索引处的小端 `", stringify!($ty), "`。")]
                pub fn $get_le(&self, index: usize) -> Result<$ty, BufferError> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    self.get_bytes(index, &mut raw)?;
                    Ok(<$ty>::from_le_bytes(raw))
                }

                #[doc = concat!("以大端序写入绝对索引处的 `", stringify!($ty), "`，不移动游标。")]
                pub fn $set(&mut self, index: usize, value: $ty) -> Result<(), BufferError> {
                    self.set_bytes(index, &value.to_be_bytes())
                }

                #[doc = concat!("以小端序写入绝对索引处的 `", stringify!($ty), "`。")]
                pub fn $set_le(&mut self, index: usize, value: $ty) -> Result<(), BufferError> {
                    self.set_bytes(index, &value.to_le_bytes())
                }

                #[doc = concat!("顺序读取大端 `", stringify!($ty), "` 并推进读游标。")]
                pub fn $read(&mut self) -> Result<$ty, BufferError> {
                    const SIZE: usize = core::mem::size_of::<$ty>();
                    self.check_readable(SIZE)?;
                    let value = self.$get(self.reader_index)?;
                    self.reader_index += SIZE;
                    Ok(value)
                }

                #[doc = concat!("顺序读取小端 `", stringify!($ty), "`。")]
                pub fn $read_le(&mut self) -> Result<$ty, BufferError> {
                    const SIZE: usize = core::mem::size_of::<$ty>();
                    self.check_readable(SIZE)?;
                    let value = self.$get_le(self.reader_index)?;
                    self.reader_index += SIZE;
                    Ok(value)
                }

                #[doc = concat!("顺序写入大端 `", stringify!($ty), "`，必要时扩容。")]
                pub fn $write(&mut self, value: $ty) -> Result<(), BufferError> {
                    const SIZE: usize = core::mem::size_of::<$ty>();
                    self.ensure_writable(SIZE)?;
                    self.$set(self.writer_index, value)?;
                    self.writer_index += SIZE;
                    Ok(())
                }

                #[doc = concat!("顺序写入小端 `", stringify!($ty), "`。")]
                pub fn $write_le(&mut self, value: $ty) -> Result<(), BufferError> {
                    const SIZE: usize = core::mem::size_of::<$ty>();
                    self.ensure_writable(SIZE)?;
                    self.$set_le(self.writer_index, value)?;
                    self.writer_index += SIZE;
                    Ok(())
                }
            )*
        }
    };
}

primitive_accessors! {
    u16 => get_u16, get_u16_le, set_u16, set_u16_le, read_u16, read_u16_le, write_u16, write_u16_le;
    i16 => get_i16, get_i16_le, set_i16, set_i16_le, read_i16, read_i16_le, write_i16, write_i16_le;
    u32 => get_u32, get_u32_le, set_u32, set_u32_le, read_u32, read_u32_le, write_u32, write_u32_le;
    i32 => get_i32, get_i32_le, set_i32, set_i32_le, read_i32, read_i32_le, write_i32, write_i32_le;
    u64 => get_u64, get_u64_le, set_u64, set_u64_le, read_u64, read_u64_le, write_u64, write_u64_le;
    i64 => get_i64, get_i64_le, set_i64, set_i64_le, read_i64, read_i64_le, write_i64, write_i64_le;
    f32 => get_f32, get_f32_le, set_f32, set_f32_le, read_f32, read_f32_le, write_f32, write_f32_le;
    f64 => get_f64, get_f64_le, set_f64, set_f64_le, read_f64, read_f64_le, write_f64, write_f64_le;
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.storage.ref_count() == 0 {
            return write!(f, "ByteBuf(released)");
        }
        write!(
            f,
            "ByteBuf(ridx: {}, widx: {}, cap: {})",
            self.reader_index,
            self.writer_index,
            self.capacity()
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::allocator::{BufAllocator, HeapAllocator};

    /// 游标恒序不变式在基本读写序列下保持成立。
    #[test]
    fn cursor_ordering_holds_across_basic_operations() {
        let mut buf = HeapAllocator.buffer(8, 16).expect("分配应成功");
        buf.write_u32(7).expect("写入应成功");
        assert!(buf.reader_index() <= buf.writer_index());
        assert!(buf.writer_index() <= buf.capacity());
        assert!(buf.capacity() <= buf.max_capacity());
        buf.read_u16().expect("读取应成功");
        assert!(buf.reader_index() <= buf.writer_index());
    }

    /// 定位写入后原样读回。
    #[test]
    fn set_then_get_round_trips() {
        let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
        buf.set_u64(2, 0x0102_0304_0506_0708).expect("定位写应成功");
        assert_eq!(buf.get_u64(2).expect("定位读应成功"), 0x0102_0304_0506_0708);
        assert_eq!(buf.writer_index(), 0, "定位写不应移动写游标");
    }

    /// 24 位访问器的符号扩展语义。
    #[test]
    fn medium_accessor_sign_extends_from_bit_23() {
        let mut buf = HeapAllocator.buffer(8, 8).expect("分配应成功");
        buf.write_u24(0xFF_FFFE).expect("写入应成功");
        assert_eq!(buf.get_u24(0).expect("无符号读取"), 0xFF_FFFE);
        assert_eq!(buf.get_i24(0).expect("有符号读取"), -2);
    }

    /// 失败的读取不移动游标。
    #[test]
    fn failed_read_leaves_state_unchanged() {
        let mut buf = HeapAllocator.buffer(4, 4).expect("分配应成功");
        buf.write_u16(9).expect("写入应成功");
        let before = (buf.reader_index(), buf.writer_index());
        assert!(buf.read_u32().is_err(), "可读字节不足应报错");
        assert_eq!((buf.reader_index(), buf.writer_index()), before);
    }
}
