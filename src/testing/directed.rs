use super::{data_1kb, data_512b, data_64b, msg, run_test, MemData, Msg};
use crate::config;
use color_eyre::eyre;

/// Repeating byte pattern `0xiiiiiiii`.
fn pattern(i: u32) -> u32 {
    0x0101_0101 * i
}

/// One word in each of the first eight sets, in distinct lines.
fn scattered_addr(i: u32) -> u64 {
    u64::from(i) * 0x1010
}

// write init

fn write_init_word() -> Vec<Msg> {
    vec![msg("in", 0x0, 0x1000, 0, 0xdead_beef, 0, 0)]
}

fn write_init_multi_word() -> Vec<Msg> {
    (0..4)
        .map(|i| msg("in", i, 0x1000, 0, 0xdead_beef, 0, 0))
        .collect()
}

fn write_init_cacheline() -> Vec<Msg> {
    (0..4)
        .map(|i| msg("in", i, 0x1000 + u64::from(i) * 4, 0, pattern(i + 1), 0, 0))
        .collect()
}

fn write_init_multi_cacheline() -> Vec<Msg> {
    (0..8)
        .map(|i| msg("in", i, scattered_addr(i), 0, pattern(i), 0, 0))
        .collect()
}

// read hits

fn read_hit_word() -> Vec<Msg> {
    vec![
        msg("in", 0x0, 0x1000, 0, 0xdead_beef, 0, 0),
        msg("rd", 0x0, 0x1000, 0, 0, 1, 0xdead_beef),
    ]
}

fn read_hit_multi_word() -> Vec<Msg> {
    let mut msgs = vec![msg("in", 0x0, 0x1000, 0, 0xdead_beef, 0, 0)];
    msgs.extend((0..4).map(|i| msg("rd", i, 0x1000, 0, 0, 1, 0xdead_beef)));
    msgs
}

fn read_hit_cacheline() -> Vec<Msg> {
    let words = || (0..4u32).map(|i| (i, 0x1000 + u64::from(i) * 4, pattern(i + 1)));
    let mut msgs: Vec<_> = words()
        .map(|(i, addr, data)| msg("in", i, addr, 0, data, 0, 0))
        .collect();
    msgs.extend(words().map(|(i, addr, data)| msg("rd", i + 4, addr, 0, 0, 1, data)));
    msgs
}

fn read_hit_multi_cacheline() -> Vec<Msg> {
    let mut msgs = write_init_multi_cacheline();
    msgs.extend((0..8).map(|i| msg("rd", i, scattered_addr(i), 0, 0, 1, pattern(i))));
    msgs
}

// write hits

fn write_hit_word() -> Vec<Msg> {
    vec![
        msg("in", 0x0, 0x1000, 0, 0xdead_beef, 0, 0),
        msg("wr", 0x0, 0x1000, 0, 0xcafe_cafe, 1, 0),
        msg("rd", 0x0, 0x1000, 0, 0, 1, 0xcafe_cafe),
    ]
}

fn write_hit_multi_word() -> Vec<Msg> {
    let mut msgs = vec![msg("in", 0x0, 0x1000, 0, 0xdead_beef, 0, 0)];
    for i in 1..=4 {
        msgs.push(msg("wr", 2 * i - 1, 0x1000, 0, pattern(i), 1, 0));
        msgs.push(msg("rd", 2 * i, 0x1000, 0, 0, 1, pattern(i)));
    }
    msgs
}

fn write_hit_cacheline() -> Vec<Msg> {
    let words = || (0..4u32).map(|i| (i, 0x1000 + u64::from(i) * 4));
    let mut msgs: Vec<_> = words()
        .map(|(i, addr)| msg("in", 0x0, addr, 0, pattern(i + 1), 0, 0))
        .collect();
    msgs.extend(words().map(|(i, addr)| msg("wr", 2 * i + 1, addr, 0, pattern(i + 1), 1, 0)));
    msgs.extend(words().map(|(i, addr)| msg("rd", 2 * i + 2, addr, 0, 0, 1, pattern(i + 1))));
    msgs
}

fn write_hit_multi_cacheline() -> Vec<Msg> {
    let mut msgs = write_init_multi_cacheline();
    msgs.extend((0..8).map(|i| msg("wr", i, scattered_addr(i), 0, pattern(i + 0x10), 1, 0)));
    msgs.extend(
        (0..8).map(|i| msg("rd", i, scattered_addr(i), 0, 0, 1, pattern(i + 0x10))),
    );
    msgs
}

// read misses

fn read_miss_word() -> Vec<Msg> {
    vec![msg("rd", 0x0, 0x1000, 0, 0, 0, 0x000c_0ffe)]
}

fn read_miss_multi_word() -> Vec<Msg> {
    (0..4)
        .map(|i| msg("rd", i, 0x1000, 0, 0, u8::from(i > 0), 0x000c_0ffe))
        .collect()
}

fn read_miss_cacheline() -> Vec<Msg> {
    vec![
        msg("rd", 0x1, 0x1000, 0, 0, 0, 0x000c_0ffe),
        msg("rd", 0x2, 0x1004, 0, 0, 1, 0x1010_1010),
        msg("rd", 0x3, 0x1008, 0, 0, 1, 0x2020_2020),
        msg("rd", 0x4, 0x100c, 0, 0, 1, 0x3030_3030),
    ]
}

fn read_miss_multi_cacheline() -> Vec<Msg> {
    let read = |offset: u32, test: u8| {
        (0..16).map(move |i| {
            let addr = 0x1000 + i * 0x10 + offset;
            msg("rd", i, u64::from(addr), 0, 0, test, 0xabcd_0000 + addr)
        })
    };
    read(0, 0).chain(read(0, 1)).chain(read(4, 1)).collect()
}

// write misses

fn write_miss_word() -> Vec<Msg> {
    vec![
        msg("wr", 0x0, 0x1000, 0, 0xcafe_cafe, 0, 0),
        msg("rd", 0x0, 0x1000, 0, 0, 1, 0xcafe_cafe),
    ]
}

fn write_miss_multi_word() -> Vec<Msg> {
    let mut msgs = Vec::new();
    for i in 1..=4 {
        msgs.push(msg("wr", 2 * i - 1, 0x1000, 0, pattern(i), u8::from(i > 1), 0));
        msgs.push(msg("rd", 2 * i, 0x1000, 0, 0, 1, pattern(i)));
    }
    msgs
}

fn write_miss_cacheline() -> Vec<Msg> {
    let words = || (0..4u32).map(|i| (i, 0x1000 + u64::from(i) * 4));
    let mut msgs: Vec<_> = words()
        .map(|(i, addr)| msg("wr", i + 1, addr, 0, pattern(i + 1), u8::from(i > 0), 0))
        .collect();
    msgs.extend(words().map(|(i, addr)| msg("rd", i + 5, addr, 0, 0, 1, pattern(i + 1))));
    msgs
}

/// One word in each of 16 consecutive lines starting at `0x1000`.
fn line_words() -> impl Iterator<Item = (u32, u64, u32)> {
    (0..16).map(|i| (i, 0x1000 + u64::from(i) * 0x10, pattern(i + 0x10)))
}

fn write_miss_multi_cacheline() -> Vec<Msg> {
    let mut msgs: Vec<_> = line_words()
        .map(|(i, addr, data)| msg("wr", i, addr, 0, data, 0, 0))
        .collect();
    msgs.extend(line_words().map(|(i, addr, data)| msg("rd", i, addr, 0, 0, 1, data)));
    msgs
}

// evictions

/// `0x1000`, `0x1080` and `0x1100` share a line slot in the direct mapped
/// cache and a set in the two way cache, where `0x1080` is touched last.
fn evict_word() -> Vec<Msg> {
    vec![
        msg("wr", 0x0, 0x1000, 0, 0xcafe_cafe, 0, 0),
        msg("rd", 0x0, 0x1000, 0, 0, 1, 0xcafe_cafe),
        msg("wr", 0x0, 0x1080, 0, 0x000c_0ffe, 0, 0),
        msg("rd", 0x0, 0x1080, 0, 0, 1, 0x000c_0ffe),
        msg("rd", 0x0, 0x1100, 0, 0, 0, 0xabcd_1100),
        msg("rd", 0x0, 0x1000, 0, 0, 0, 0xcafe_cafe),
    ]
}

fn evict_multi_word() -> Vec<Msg> {
    let mut msgs = Vec::new();
    let mut opaque = (0..16).cycle();
    let mut next = || opaque.next().unwrap_or_default();
    for round in 1..=4 {
        let first = pattern(round);
        let second = pattern(round + 0x10);
        let second_hit = u8::from(round > 1);
        msgs.extend([
            msg("wr", next(), 0x1000, 0, first, 0, 0),
            msg("rd", next(), 0x1000, 0, 0, 1, first),
            msg("wr", next(), 0x1080, 0, second, second_hit, 0),
            msg("rd", next(), 0x1080, 0, 0, 1, second),
            msg("rd", next(), 0x1100, 0, 0, 0, 0xabcd_1100),
            // 0x1080 must survive
            msg("rd", next(), 0x1080, 0, 0, 1, second),
        ]);
    }
    msgs.push(msg("rd", next(), 0x1000, 0, 0, 0, pattern(4)));
    msgs
}

fn evict_cacheline() -> Vec<Msg> {
    let mut msgs = Vec::new();
    for (line, base) in [(0, 0x1000), (1, 0x1080)] {
        for i in 0..4 {
            let opaque = line * 4 + i;
            let data = pattern(line * 0x10 + i + 1);
            let addr = base + u64::from(i) * 4;
            msgs.push(msg("wr", opaque, addr, 0, data, u8::from(i > 0), 0));
        }
    }
    msgs.push(msg("rd", 0x8, 0x1100, 0, 0, 0, 0xabcd_1100));
    for i in 0..4 {
        let addr = 0x1000 + u64::from(i) * 4;
        msgs.push(msg("rd", 0x9 + i, addr, 0, 0, u8::from(i > 0), pattern(i + 1)));
    }
    msgs
}

fn evict_multi_cacheline() -> Vec<Msg> {
    let mut msgs = write_miss_multi_cacheline();
    msgs.extend((0..16).map(|i| {
        let addr = 0x1100 + i * 0x10;
        msg("rd", i, u64::from(addr), 0, 0, 0, 0xabcd_0000 + addr)
    }));
    msgs.extend(line_words().map(|(i, addr, data)| msg("rd", i, addr, 0, 0, 0, data)));
    msgs
}

// mixed

/// `0x1000`, `0x2000` and `0x3000` all map to set zero. Only the dirty
/// write-back of `0x3000` can produce the final read data.
fn conflict_miss_both() -> Vec<Msg> {
    vec![
        msg("wr", 0x4, 0x3000, 0, 0x0000_feed, 0, 0),
        msg("wr", 0x0, 0x1000, 0, 0xcafe_cafe, 0, 0),
        msg("rd", 0x1, 0x1000, 0, 0, 1, 0xcafe_cafe),
        msg("wr", 0x2, 0x2000, 0, 0x000c_0ffe, 0, 0),
        msg("rd", 0x3, 0x2000, 0, 0, 1, 0x000c_0ffe),
        msg("rd", 0x4, 0x3000, 0, 0x0000_feed, 0, 0x0000_feed),
    ]
}

fn read_write_full_line() -> Vec<Msg> {
    let words = [0xcafe_cafe, 0x000c_0ffe, 0xdead_0000, 0x0000_beef];
    let addrs = (0u64..).map(|i| 0x1000 + i * 4);
    let mut msgs: Vec<_> = addrs
        .clone()
        .zip(words)
        .enumerate()
        .map(|(i, (addr, data))| msg("wr", 0x0, addr, 0, data, u8::from(i > 0), 0))
        .collect();
    msgs.extend(addrs.zip(words).map(|(addr, data)| msg("rd", 0x0, addr, 0, 0, 1, data)));
    msgs
}

/// Sixteen lines fill both the direct mapped and the two way cache.
fn write_every_line() -> Vec<Msg> {
    let mut msgs: Vec<_> = (0..16)
        .map(|i| msg("wr", i, scattered_addr(i), 0, pattern(i), 0, 0))
        .collect();
    msgs.extend((0..16).map(|i| msg("rd", i, scattered_addr(i), 0, pattern(i), 1, pattern(i))));
    msgs
}

fn capacity_miss() -> Vec<Msg> {
    let mut msgs: Vec<_> = (0..16)
        .map(|i| msg("wr", i, scattered_addr(i), 0, pattern(i), 0, 0))
        .collect();
    msgs.extend((0..16).map(|i| {
        let addr = 0x1100 + u64::from(i) * 0x10;
        msg("wr", i, addr, 0, pattern(i + 0x10), 0, 0)
    }));
    msgs.extend((0..16).map(|i| msg("rd", i, scattered_addr(i), 0, 0, 0, pattern(i))));
    msgs
}

/// Sub-word accesses within a line.
fn sub_word() -> Vec<Msg> {
    vec![
        msg("rd", 0x0, 0x1000, 1, 0, 0, 0xfe),
        msg("rd", 0x1, 0x1001, 2, 0, 1, 0x0c0f),
        msg("wr", 0x2, 0x1003, 1, 0xab, 1, 0),
        msg("rd", 0x3, 0x1000, 0, 0, 1, 0xab0c_0ffe),
        msg("in", 0x4, 0x2002, 2, 0xbeef, 0, 0),
        msg("rd", 0x5, 0x2000, 0, 0, 1, 0xbeef_0000),
    ]
}

macro_rules! directed_tests {
    ($($name:ident: ($msgs:expr, $data:expr),)*) => {
        $(
            paste::paste! {
                #[test]
                fn [<dmap_ $name>]() -> eyre::Result<()> {
                    run_test(config::Cache::direct_mapped(), &$msgs, $data)
                }

                #[test]
                fn [<sassoc_ $name>]() -> eyre::Result<()> {
                    run_test(config::Cache::set_associative(), &$msgs, $data)
                }
            }
        )*
    }
}

directed_tests! {
    write_init_word: (write_init_word(), None),
    write_init_multi_word: (write_init_multi_word(), None),
    write_init_cacheline: (write_init_cacheline(), None),
    write_init_multi_cacheline: (write_init_multi_cacheline(), None),
    read_hit_word: (read_hit_word(), None),
    read_hit_multi_word: (read_hit_multi_word(), None),
    read_hit_cacheline: (read_hit_cacheline(), None),
    read_hit_multi_cacheline: (read_hit_multi_cacheline(), None),
    write_hit_word: (write_hit_word(), None),
    write_hit_multi_word: (write_hit_multi_word(), None),
    write_hit_cacheline: (write_hit_cacheline(), None),
    write_hit_multi_cacheline: (write_hit_multi_cacheline(), None),
    read_miss_word: (read_miss_word(), Some(data_64b())),
    read_miss_multi_word: (read_miss_multi_word(), Some(data_64b())),
    read_miss_cacheline: (read_miss_cacheline(), Some(data_64b())),
    read_miss_multi_cacheline: (read_miss_multi_cacheline(), Some(data_512b())),
    write_miss_word: (write_miss_word(), Some(data_64b())),
    write_miss_multi_word: (write_miss_multi_word(), Some(data_64b())),
    write_miss_cacheline: (write_miss_cacheline(), Some(data_64b())),
    write_miss_multi_cacheline: (write_miss_multi_cacheline(), Some(data_512b())),
    evict_word: (evict_word(), Some(data_512b())),
    evict_multi_word: (evict_multi_word(), Some(data_512b())),
    evict_cacheline: (evict_cacheline(), Some(data_512b())),
    evict_multi_cacheline: (evict_multi_cacheline(), Some(data_512b())),
    conflict_miss_both: (conflict_miss_both(), None),
    read_write_full_line: (read_write_full_line(), None),
    write_every_line: (write_every_line(), None),
    capacity_miss: (capacity_miss(), None),
    sub_word: (sub_word(), Some(data_64b())),
}

/// `0x4000` and `0x2000` share set zero.
fn conflict_miss(second_read_hits: bool) -> Vec<Msg> {
    vec![
        msg("wr", 0x0, 0x4000, 0, 0xcafe_cafe, 0, 0),
        msg("rd", 0x0, 0x4000, 0, 0, 1, 0xcafe_cafe),
        msg("wr", 0x0, 0x2000, 0, 0x000c_0ffe, 0, 0),
        msg("rd", 0x0, 0x2000, 0, 0, 1, 0x000c_0ffe),
        msg("rd", 0x0, 0x4000, 0, 0, u8::from(second_read_hits), 0xcafe_cafe),
    ]
}

#[test]
fn dmap_conflict_miss() -> eyre::Result<()> {
    run_test(
        config::Cache::direct_mapped(),
        &conflict_miss(false),
        Some(data_64b()),
    )
}

#[test]
fn sassoc_no_conflict_miss() -> eyre::Result<()> {
    run_test(
        config::Cache::set_associative(),
        &conflict_miss(true),
        Some(data_64b()),
    )
}

#[test]
fn dmap_read_write_hit_clean() -> eyre::Result<()> {
    let msgs = [
        msg("in", 0x0, 0x0000, 0, 0xdead_beef, 0, 0),
        msg("rd", 0x1, 0x0000, 0, 0, 1, 0xdead_beef),
        msg("wr", 0x2, 0x0000, 0, 0xcafe_cafe, 1, 0),
        msg("rd", 0x3, 0x0000, 0, 0, 1, 0xcafe_cafe),
    ];
    run_test(config::Cache::direct_mapped(), &msgs, None)
}

/// Cycling 64 lines through a set of two ways under LRU never hits.
#[test]
fn sassoc_full_1kb_sweep() -> eyre::Result<()> {
    let sweep = |test: u8| {
        (0..64u32).map(move |i| {
            let addr = 0x1000 + i * 0x10;
            msg("rd", i, u64::from(addr), 0, 0, test, 0xabcd_0000 + addr)
        })
    };
    let msgs: Vec<_> = sweep(0).chain(sweep(0)).collect();
    run_test(config::Cache::set_associative(), &msgs, Some(data_1kb()))
}

fn bank_test_data() -> MemData {
    vec![
        (0x000, 0xdead_beef),
        (0x100, 0x00c0_ffee),
        (0x200, 0xffff_ffff),
    ]
}

/// `0x000`, `0x100` and `0x200` differ only in bits that index sets once
/// the bank bits push the index above the line offset.
fn bank_test(last_read_hits: bool) -> Vec<Msg> {
    vec![
        msg("rd", 0x0, 0x000, 0, 0, 0, 0xdead_beef),
        msg("rd", 0x1, 0x100, 0, 0, 0, 0x00c0_ffee),
        msg("rd", 0x2, 0x200, 0, 0, 0, 0xffff_ffff),
        msg("rd", 0x3, 0x000, 0, 0, u8::from(last_read_hits), 0xdead_beef),
    ]
}

macro_rules! bank_tests {
    ($($name:ident: ($config:expr, $hit:expr),)*) => {
        $(
            paste::paste! {
                #[test]
                fn [<bank_ $name>]() -> eyre::Result<()> {
                    run_test($config, &bank_test($hit), Some(bank_test_data()))
                }
            }
        )*
    }
}

bank_tests! {
    dmap: (config::Cache::direct_mapped().with_banks(4), true),
    sassoc: (config::Cache::set_associative().with_banks(4), true),
    dmap_unbanked: (config::Cache::direct_mapped(), false),
    sassoc_unbanked: (config::Cache::set_associative(), false),
}

/// A fourth line that would share set zero without banking leaves the
/// other three resident.
#[test]
fn bank_separation_keeps_lines_resident() -> eyre::Result<()> {
    for config in [
        config::Cache::direct_mapped().with_banks(4),
        config::Cache::set_associative().with_banks(4),
    ] {
        let mut msgs = bank_test(true);
        msgs.pop();
        msgs.push(msg("rd", 0x3, 0x300, 0, 0, 0, 0));
        msgs.extend([
            msg("rd", 0x4, 0x000, 0, 0, 1, 0xdead_beef),
            msg("rd", 0x5, 0x100, 0, 0, 1, 0x00c0_ffee),
            msg("rd", 0x6, 0x200, 0, 0, 1, 0xffff_ffff),
        ]);
        run_test(config, &msgs, Some(bank_test_data()))?;
    }
    Ok(())
}
