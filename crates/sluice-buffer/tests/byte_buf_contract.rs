//! `byte_buf_contract` 集成测试：聚焦游标不变式、扩容契约与压缩语义。
//!
//! # 测试总览（Why）
//! - 校验任意操作序列后 `0 <= reader <= writer <= capacity <= max` 恒成立；
//! - 覆盖扩容到上限后的失败路径，确认失败不改状态；
//! - 验证压缩对标记的平移与钳制，以及条件压缩的半容量门槛。

use sluice_buffer::{BufAllocator, BufferError, HeapAllocator, WritableCheck};

/// 大端写入后按大端读回，再经反序视图读出字节交换后的值。
#[test]
fn endian_round_trip_through_swapped_view() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_i32(0x1122_3344).expect("写入应成功");
    assert_eq!(buf.read_i32().expect("大端读取"), 0x1122_3344);

    buf.set_reader_index(0).expect("重置读游标");
    assert_eq!(buf.swapped().read_i32().expect("反序读取"), 0x4433_2211);
}

/// `_le` 访问器与反序视图落盘一致。
#[test]
fn little_endian_accessors_match_swapped_view_writes() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.swapped().write_u16(0xABCD).expect("反序写入");
    assert_eq!(buf.get_u16_le(0).expect("小端读取"), 0xABCD);
    assert_eq!(buf.get_u16(0).expect("大端读取"), 0xCDAB);
}

/// 增长到上限后继续写入失败，且失败不改动游标。
#[test]
fn grow_to_max_then_further_write_fails_without_mutation() {
    let mut buf = HeapAllocator.buffer(4, 8).expect("分配应成功");
    buf.write_bytes(&[1, 2, 3, 4, 5]).expect("触发扩容的写入应成功");
    assert_eq!(buf.capacity(), 8, "容量应增长到上限");
    buf.write_bytes(&[6, 7, 8]).expect("填满剩余空间");
    assert_eq!(buf.writer_index(), 8);

    let error = buf.write_u8(9).expect_err("超出上限的写入应失败");
    assert!(matches!(error, BufferError::Capacity { .. }));
    assert_eq!(buf.writer_index(), 8, "失败后写游标不变");
    assert_eq!(buf.capacity(), 8, "失败后容量不变");
}

/// 压缩平移标记并钳制在新写游标内，`reset_reader` 落回平移后的位置。
#[test]
fn discard_read_shifts_and_clamps_markers() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(&[0, 1, 2, 3, 4, 5, 6, 7]).expect("填充数据");
    buf.set_reader_index(6).expect("读游标至 6");
    buf.mark_reader().expect("记录读游标");
    buf.set_reader_index(4).expect("回拨到 4 以便压缩");

    buf.discard_read().expect("压缩应成功");
    assert_eq!(buf.reader_index(), 0);
    assert_eq!(buf.writer_index(), 4);
    buf.reset_reader().expect("标记已被平移");
    assert_eq!(buf.reader_index(), 2, "标记 6 平移 4 后应为 2");
}

/// 压缩保持可读内容与可读长度不变。
#[test]
fn discard_read_preserves_readable_content() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(b"abcdefgh").expect("填充数据");
    buf.skip(3).expect("消费前缀");
    let readable_before = buf.readable_bytes();

    buf.discard_read().expect("压缩应成功");
    assert_eq!(buf.readable_bytes(), readable_before);
    let mut rest = [0u8; 5];
    buf.read_bytes(&mut rest).expect("读出剩余内容");
    assert_eq!(&rest, b"defgh");
}

/// 条件压缩只在读游标越过容量一半后才搬移。
#[test]
fn discard_some_read_honors_half_capacity_threshold() {
    let mut buf = HeapAllocator.buffer(8, 8).expect("分配应成功");
    buf.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).expect("填满");
    buf.skip(3).expect("读游标 3，小于容量一半");
    buf.discard_some_read().expect("条件压缩");
    assert_eq!(buf.reader_index(), 3, "未过门槛不应搬移");

    buf.skip(1).expect("读游标 4，达到容量一半");
    buf.discard_some_read().expect("条件压缩");
    assert_eq!(buf.reader_index(), 0, "过门槛后应搬移");
    assert_eq!(buf.writer_index(), 4);
}

/// 读空时条件压缩直接归零游标。
#[test]
fn discard_some_read_resets_when_fully_consumed() {
    let mut buf = HeapAllocator.buffer(8, 8).expect("分配应成功");
    buf.write_u16(7).expect("写入");
    buf.read_u16().expect("读尽");
    buf.discard_some_read().expect("条件压缩");
    assert_eq!(buf.reader_index(), 0);
    assert_eq!(buf.writer_index(), 0);
}

/// `ensure_writable_partial` 的四态契约。
#[test]
fn ensure_writable_partial_reports_four_states() {
    let mut enough = HeapAllocator.buffer(8, 8).expect("分配应成功");
    assert_eq!(
        enough.ensure_writable_partial(4, false).expect("存活缓冲"),
        WritableCheck::Enough
    );

    let mut at_max = HeapAllocator.buffer(4, 4).expect("分配应成功");
    at_max.write_zero(4).expect("填满");
    assert_eq!(
        at_max.ensure_writable_partial(1, false).expect("存活缓冲"),
        WritableCheck::AtMaxCapacity
    );
    assert_eq!(
        at_max.ensure_writable_partial(1, true).expect("存活缓冲"),
        WritableCheck::AtMaxCapacity,
        "容量已在上限时强制扩容也无计可施"
    );
    assert_eq!(at_max.capacity(), 4, "四态检查不应越过上限扩容");

    let mut grew = HeapAllocator.buffer(4, 8).expect("分配应成功");
    assert_eq!(
        grew.ensure_writable_partial(6, false).expect("存活缓冲"),
        WritableCheck::Grew
    );
    assert_eq!(grew.capacity(), 8);

    let mut forced = HeapAllocator.buffer(4, 8).expect("分配应成功");
    forced.write_zero(4).expect("占满现有容量");
    assert_eq!(
        forced.ensure_writable_partial(8, true).expect("存活缓冲"),
        WritableCheck::ForcedToMax,
        "需求超限但尚有余地时应顶到上限"
    );
    assert_eq!(forced.capacity(), 8);
}

/// 顺序写入多种原生类型后按同序读回。
#[test]
fn heterogeneous_write_then_read_round_trips() {
    let mut buf = HeapAllocator.buffer(64, 64).expect("分配应成功");
    buf.write_u8(0x7F).expect("u8");
    buf.write_u16(0xBEEF).expect("u16");
    buf.write_u24(0x00AB_CDEF).expect("u24");
    buf.write_i32(-77).expect("i32");
    buf.write_u64(0xDEAD_BEEF_CAFE_F00D).expect("u64");
    buf.write_f64(3.5).expect("f64");
    buf.write_bool(true).expect("bool");

    assert_eq!(buf.read_u8().expect("u8"), 0x7F);
    assert_eq!(buf.read_u16().expect("u16"), 0xBEEF);
    assert_eq!(buf.read_u24().expect("u24"), 0x00AB_CDEF);
    assert_eq!(buf.read_i32().expect("i32"), -77);
    assert_eq!(buf.read_u64().expect("u64"), 0xDEAD_BEEF_CAFE_F00D);
    assert_eq!(buf.read_f64().expect("f64"), 3.5);
    assert!(buf.read_bool().expect("bool"));
    assert_eq!(buf.readable_bytes(), 0, "应恰好读尽");
}

/// 标记/重置在普通读写序列下復原游标。
#[test]
fn mark_and_reset_restore_cursors() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(b"0123456789").expect("填充");
    buf.skip(2).expect("消费两字节");
    buf.mark_reader().expect("记录读游标");
    buf.skip(5).expect("继续消费");
    buf.reset_reader().expect("重置读游标");
    assert_eq!(buf.reader_index(), 2);

    buf.mark_writer().expect("记录写游标");
    buf.write_bytes(b"ab").expect("追加");
    buf.reset_writer().expect("重置写游标");
    assert_eq!(buf.writer_index(), 10);
}

/// 写游标回拨到标记之下后，`reset_reader` 报告悬空标记。
#[test]
fn reset_reader_rejects_dangling_mark() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(b"abcdefgh").expect("填充");
    buf.skip(8).expect("读到末尾");
    buf.mark_reader().expect("记录读游标");
    buf.set_reader_index(0).expect("读游标归零");
    buf.set_writer_index(4).expect("写游标回拨");
    assert!(buf.reset_reader().is_err(), "标记越过写游标应报错");
}

/// `set_zero` 与 `write_zero` 清零指定区间。
#[test]
fn zero_fill_operations_clear_requested_ranges() {
    let mut buf = HeapAllocator.buffer(32, 32).expect("分配应成功");
    buf.write_bytes(&[0xFF; 20]).expect("填充非零内容");
    buf.set_zero(2, 13).expect("定位清零");
    for i in 2..15 {
        assert_eq!(buf.get_u8(i).expect("读取"), 0, "第 {i} 字节应被清零");
    }
    assert_eq!(buf.get_u8(15).expect("读取"), 0xFF, "区间之外不受影响");

    buf.write_zero(9).expect("顺序写零");
    assert_eq!(buf.writer_index(), 29);
    for i in 20..29 {
        assert_eq!(buf.get_u8(i).expect("读取"), 0);
    }
}

/// `index_of` 返回窗口内首个命中，未命中返回 `None`。
#[test]
fn index_of_scans_requested_window() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(b"hello world").expect("填充");
    assert_eq!(buf.index_of(0, 11, b'o').expect("查找"), Some(4));
    assert_eq!(buf.index_of(5, 11, b'o').expect("查找"), Some(7));
    assert_eq!(buf.index_of(0, 4, b'z').expect("查找"), None);
    assert!(buf.index_of(4, 2, b'z').is_err(), "窗口颠倒应报错");
}

/// `for_each_byte` 在处理器首次返回假时停住并报告索引。
#[test]
fn for_each_byte_stops_at_first_rejection() {
    let mut buf = HeapAllocator.buffer(16, 16).expect("分配应成功");
    buf.write_bytes(&[1, 2, 3, 0, 5]).expect("填充");
    buf.skip(1).expect("跳过首字节");
    let stop = buf
        .for_each_byte(|byte| byte != 0)
        .expect("遍历应成功");
    assert_eq!(stop, Some(3), "停止索引为绝对索引");
    let full = buf.for_each_byte(|_| true).expect("遍历应成功");
    assert_eq!(full, None);
}

/// 缓冲间转移同步推进双方游标。
#[test]
fn write_buf_transfers_and_advances_both_sides() {
    let mut src = HeapAllocator.buffer(16, 16).expect("分配应成功");
    src.write_bytes(b"abcdef").expect("填充源");
    let mut dst = HeapAllocator.buffer(4, 16).expect("分配应成功");

    dst.write_buf(&mut src, 4).expect("转移应成功");
    assert_eq!(src.reader_index(), 4, "源读游标应推进");
    assert_eq!(dst.writer_index(), 4, "目标写游标应推进");
    let mut out = [0u8; 4];
    dst.read_bytes(&mut out).expect("读出");
    assert_eq!(&out, b"abcd");

    assert!(dst.write_buf(&mut src, 8).is_err(), "源可读不足应报错");
}

/// 分配器的容量归一化策略：倍增段与上限收敛。
#[test]
fn allocator_normalizes_capacity_growth() {
    let alloc = HeapAllocator;
    assert_eq!(alloc.calculate_new_capacity(1, 1 << 20).expect("计算"), 64);
    assert_eq!(alloc.calculate_new_capacity(65, 1 << 20).expect("计算"), 128);
    assert_eq!(
        alloc.calculate_new_capacity(1000, 1 << 20).expect("计算"),
        1024
    );
    assert!(
        alloc.calculate_new_capacity(300, 200).is_err(),
        "需求超过上限应报错"
    );
    assert_eq!(
        alloc.calculate_new_capacity(1000, 1000).expect("计算"),
        1000,
        "归一化结果收敛到上限"
    );
}

/// 负 `i64` 与极值在 `_le` 与大端两条路径上都保真。
#[test]
fn signed_extremes_round_trip_in_both_orders() {
    let mut buf = HeapAllocator.buffer(32, 32).expect("分配应成功");
    buf.write_i64(i64::MIN).expect("大端写");
    buf.write_i64_le(i64::MAX).expect("小端写");
    assert_eq!(buf.read_i64().expect("大端读"), i64::MIN);
    assert_eq!(buf.read_i64_le().expect("小端读"), i64::MAX);
}
