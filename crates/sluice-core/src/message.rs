use std::any::Any;
use std::fmt;

use sluice_buffer::ByteBuf;

use crate::error::CoreError;

/// 管线内流转的消息载体。
///
/// # 契约说明（What）
/// - `Bytes`：引用计数缓冲，沿管线移交所有权；未经处理抵达尾哨兵时由
///   尾哨兵负责 `release`。
/// - `User`：任意用户对象，生命周期由普通所有权规则管理。
pub enum PipelineMessage {
    /// 字节缓冲。
    Bytes(ByteBuf),
    /// 用户自定义对象。
    User(Box<dyn Any + Send + 'static>),
}

impl PipelineMessage {
    /// 包装用户对象。
    pub fn user(value: impl Any + Send + 'static) -> Self {
        PipelineMessage::User(Box::new(value))
    }

    /// 借出缓冲视图（若为字节消息）。
    pub fn as_bytes(&self) -> Option<&ByteBuf> {
        match self {
            PipelineMessage::Bytes(buf) => Some(buf),
            PipelineMessage::User(_) => None,
        }
    }

    /// 可变借出缓冲视图。
    pub fn as_bytes_mut(&mut self) -> Option<&mut ByteBuf> {
        match self {
            PipelineMessage::Bytes(buf) => Some(buf),
            PipelineMessage::User(_) => None,
        }
    }

    /// 取出缓冲；非字节消息原样退回。
    pub fn into_bytes(self) -> Result<ByteBuf, PipelineMessage> {
        match self {
            PipelineMessage::Bytes(buf) => Ok(buf),
            other => Err(other),
        }
    }

    /// 归还消息持有的资源：字节消息递减引用计数，用户消息直接丢弃。
    pub fn release(self) -> Result<(), CoreError> {
        match self {
            PipelineMessage::Bytes(buf) => {
                buf.release()?;
                Ok(())
            }
            PipelineMessage::User(_) => Ok(()),
        }
    }
}

impl From<ByteBuf> for PipelineMessage {
    fn from(buf: ByteBuf) -> Self {
        PipelineMessage::Bytes(buf)
    }
}

impl fmt::Debug for PipelineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMessage::Bytes(buf) => write!(f, "PipelineMessage::Bytes({buf:?})"),
            PipelineMessage::User(_) => write!(f, "PipelineMessage::User(..)"),
        }
    }
}
