//! Bit primitives matching Go's `math/bits`.
//!
//! Generated code routes `clz`, `ctz`, `popcnt`, `rotl` and `rotr` through
//! these functions. Results are returned as `u32` counts so that callers can
//! cast to the Wasm result type (`i32` or `i64`) without intermediate checks.
//!
//! The lookup tables are computed at compile time from their defining
//! property rather than spelled out by hand.

const DE_BRUIJN32: u32 = 0x077C_B531;
const DE_BRUIJN64: u64 = 0x03f7_9d71_b4ca_8b09;

/// `POP8[b]` is the number of set bits in `b`.
static POP8: [u8; 256] = pop8_table();
/// `LEN8[b]` is the number of bits needed to represent `b`.
static LEN8: [u8; 256] = len8_table();
static DE_BRUIJN32_TAB: [u8; 32] = de_bruijn32_table();
static DE_BRUIJN64_TAB: [u8; 64] = de_bruijn64_table();

const fn pop8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut x = i;
        let mut n = 0u8;
        while x != 0 {
            n += (x & 1) as u8;
            x >>= 1;
        }
        table[i] = n;
        i += 1;
    }
    table
}

const fn len8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut x = i;
        let mut n = 0u8;
        while x != 0 {
            n += 1;
            x >>= 1;
        }
        table[i] = n;
        i += 1;
    }
    table
}

const fn de_bruijn32_table() -> [u8; 32] {
    let mut table = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        table[((DE_BRUIJN32 << i) >> 27) as usize] = i as u8;
        i += 1;
    }
    table
}

const fn de_bruijn64_table() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        table[((DE_BRUIJN64 << i) >> 58) as usize] = i as u8;
        i += 1;
    }
    table
}

// ── Len ──────────────────────────────────────────────────────────────

/// Minimum number of bits required to represent `x`; `len32(0) == 0`.
#[inline]
pub fn len32(mut x: u32) -> u32 {
    let mut n = 0;
    if x >= 1 << 16 {
        x >>= 16;
        n = 16;
    }
    if x >= 1 << 8 {
        x >>= 8;
        n += 8;
    }
    n + LEN8[x as usize] as u32
}

/// Minimum number of bits required to represent `x`; `len64(0) == 0`.
#[inline]
pub fn len64(mut x: u64) -> u32 {
    let mut n = 0;
    if x >= 1 << 32 {
        x >>= 32;
        n = 32;
    }
    if x >= 1 << 16 {
        x >>= 16;
        n += 16;
    }
    if x >= 1 << 8 {
        x >>= 8;
        n += 8;
    }
    n + LEN8[x as usize] as u32
}

// ── Counting ─────────────────────────────────────────────────────────

/// Number of leading zero bits; 32 for zero.
#[inline]
pub fn leading_zeros32(x: u32) -> u32 {
    32 - len32(x)
}

/// Number of leading zero bits; 64 for zero.
#[inline]
pub fn leading_zeros64(x: u64) -> u32 {
    64 - len64(x)
}

/// Number of trailing zero bits; 32 for zero.
#[inline]
pub fn trailing_zeros32(x: u32) -> u32 {
    if x == 0 {
        return 32;
    }
    let lowest = x & x.wrapping_neg();
    DE_BRUIJN32_TAB[(lowest.wrapping_mul(DE_BRUIJN32) >> (32 - 5)) as usize] as u32
}

/// Number of trailing zero bits; 64 for zero.
#[inline]
pub fn trailing_zeros64(x: u64) -> u32 {
    if x == 0 {
        return 64;
    }
    let lowest = x & x.wrapping_neg();
    DE_BRUIJN64_TAB[(lowest.wrapping_mul(DE_BRUIJN64) >> (64 - 6)) as usize] as u32
}

/// Number of one bits (population count).
#[inline]
pub fn ones_count32(x: u32) -> u32 {
    (POP8[(x >> 24) as usize]
        + POP8[(x >> 16 & 0xff) as usize]
        + POP8[(x >> 8 & 0xff) as usize]
        + POP8[(x & 0xff) as usize]) as u32
}

/// Number of one bits (population count).
#[inline]
pub fn ones_count64(mut x: u64) -> u32 {
    const M0: u64 = 0x5555_5555_5555_5555;
    const M1: u64 = 0x3333_3333_3333_3333;
    const M2: u64 = 0x0f0f_0f0f_0f0f_0f0f;

    x = ((x >> 1) & M0) + (x & M0);
    x = ((x >> 2) & M1) + (x & M1);
    x = ((x >> 4) + x) & M2;
    x += x >> 8;
    x += x >> 16;
    x += x >> 32;
    (x as u32) & ((1 << 7) - 1)
}

// ── Rotation ─────────────────────────────────────────────────────────

/// Rotate `x` left by `k mod 32` bits. A negative `k` rotates right.
#[inline]
pub fn rotate_left32(x: u32, k: i32) -> u32 {
    let s = (k as u32) & 31;
    x.wrapping_shl(s) | x.checked_shr(32 - s).unwrap_or(0)
}

/// Rotate `x` left by `k mod 64` bits. A negative `k` rotates right.
#[inline]
pub fn rotate_left64(x: u64, k: i32) -> u64 {
    let s = (k as u32) & 63;
    x.wrapping_shl(s) | x.checked_shr(64 - s).unwrap_or(0)
}
