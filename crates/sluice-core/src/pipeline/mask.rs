use core::fmt;
use core::ops::BitOr;

/// Handler 声明式能力位图。
///
/// # 设计背景（Why）
/// - 事件传播时需要跳过不处理某类事件的上下文；在静态类型语言里无法
///   反射探测"哪些回调被覆写"，因此由 Handler 在描述符里声明处理集合，
///   上下文在构造时一次性定格为跳过位图。
///
/// # 契约说明（What）
/// - 未声明的事件在传播中被直接越过，对应回调不会被调用；
/// - 声明了但未覆写的回调走默认转发体，语义与被跳过一致。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u32);

impl EventMask {
    /// 空集合。
    pub const NONE: EventMask = EventMask(0);
    /// 生命周期：挂载完成。
    pub const HANDLER_ADDED: EventMask = EventMask(1 << 0);
    /// 生命周期：移除完成。
    pub const HANDLER_REMOVED: EventMask = EventMask(1 << 1);
    /// 入站：通道注册。
    pub const CHANNEL_REGISTERED: EventMask = EventMask(1 << 2);
    /// 入站：通道注销。
    pub const CHANNEL_UNREGISTERED: EventMask = EventMask(1 << 3);
    /// 入站：通道活跃。
    pub const CHANNEL_ACTIVE: EventMask = EventMask(1 << 4);
    /// 入站：通道失活。
    pub const CHANNEL_INACTIVE: EventMask = EventMask(1 << 5);
    /// 入站：读到消息。
    pub const CHANNEL_READ: EventMask = EventMask(1 << 6);
    /// 入站：一轮读取完成。
    pub const CHANNEL_READ_COMPLETE: EventMask = EventMask(1 << 7);
    /// 入站：用户事件。
    pub const USER_EVENT: EventMask = EventMask(1 << 8);
    /// 入站：可写性变化。
    pub const WRITABILITY_CHANGED: EventMask = EventMask(1 << 9);
    /// 入站：异常事件。
    pub const EXCEPTION_CAUGHT: EventMask = EventMask(1 << 10);
    /// 出站：绑定。
    pub const BIND: EventMask = EventMask(1 << 11);
    /// 出站：连接。
    pub const CONNECT: EventMask = EventMask(1 << 12);
    /// 出站：断开。
    pub const DISCONNECT: EventMask = EventMask(1 << 13);
    /// 出站：关闭。
    pub const CLOSE: EventMask = EventMask(1 << 14);
    /// 出站：注销。
    pub const DEREGISTER: EventMask = EventMask(1 << 15);
    /// 出站：读请求。
    pub const READ: EventMask = EventMask(1 << 16);
    /// 出站：写消息。
    pub const WRITE: EventMask = EventMask(1 << 17);
    /// 出站：冲刷。
    pub const FLUSH: EventMask = EventMask(1 << 18);

    /// 全部入站事件。
    pub const ALL_INBOUND: EventMask = EventMask(
        Self::CHANNEL_REGISTERED.0
            | Self::CHANNEL_UNREGISTERED.0
            | Self::CHANNEL_ACTIVE.0
            | Self::CHANNEL_INACTIVE.0
            | Self::CHANNEL_READ.0
            | Self::CHANNEL_READ_COMPLETE.0
            | Self::USER_EVENT.0
            | Self::WRITABILITY_CHANGED.0
            | Self::EXCEPTION_CAUGHT.0,
    );

    /// 全部出站事件。
    pub const ALL_OUTBOUND: EventMask = EventMask(
        Self::BIND.0
            | Self::CONNECT.0
            | Self::DISCONNECT.0
            | Self::CLOSE.0
            | Self::DEREGISTER.0
            | Self::READ.0
            | Self::WRITE.0
            | Self::FLUSH.0,
    );

    /// 全部事件（含生命周期）。
    pub const ALL: EventMask = EventMask(
        Self::HANDLER_ADDED.0
            | Self::HANDLER_REMOVED.0
            | Self::ALL_INBOUND.0
            | Self::ALL_OUTBOUND.0,
    );

    /// 并集。
    pub const fn union(self, other: EventMask) -> EventMask {
        EventMask(self.0 | other.0)
    }

    /// 是否包含给定集合的全部位。
    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// 是否与给定集合有交集。
    pub const fn intersects(self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        self.union(rhs)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventMask({:#021b})", self.0)
    }
}
