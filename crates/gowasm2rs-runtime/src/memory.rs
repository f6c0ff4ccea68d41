//! WebAssembly linear memory.
//!
//! The backing store is a `Vec<u8>` sized to the active region. `grow` is
//! the only operation that changes the size, and it saturates at
//! [`MAX_MEMORY_SIZE`] instead of failing: the Go runtime treats a short
//! grow as ordinary allocation pressure.
//!
//! Accessors take absolute byte addresses and perform no validation of
//! their own. An out-of-range address panics through slice indexing; the
//! generated code never emits an explicit check.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::{MAX_MEMORY_SIZE, PAGE_SIZE};

/// An initial data segment: `data` is copied to `offset` at construction.
#[derive(Debug, Clone, Copy)]
pub struct DataSegment<'a> {
    pub offset: usize,
    pub data: &'a [u8],
}

/// Linear memory for a single module instance.
pub struct LinearMemory {
    bytes: Vec<u8>,
}

impl LinearMemory {
    /// Create a zeroed memory of `initial_pages` pages (clamped to the ceiling).
    pub fn new(initial_pages: u32) -> Self {
        let size = pages_to_bytes(initial_pages as usize);
        Self {
            bytes: vec![0; size],
        }
    }

    /// Create a memory and copy every data segment in, in order.
    pub fn with_data(initial_pages: u32, segments: &[DataSegment<'_>]) -> Self {
        let mut memory = Self::new(initial_pages);
        for segment in segments {
            memory.store_bytes(segment.offset, segment.data);
        }
        memory
    }

    // ── size / grow ──────────────────────────────────────────────────

    /// Wasm `memory.size`: current page count.
    #[inline(always)]
    pub fn size(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    /// Current size in bytes (always a whole number of pages).
    #[inline(always)]
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Wasm `memory.grow`: returns the previous page count.
    ///
    /// The new size is `min((prev + delta) * PAGE_SIZE, MAX_MEMORY_SIZE)`.
    /// New bytes are zero.
    pub fn grow(&mut self, delta: u32) -> u32 {
        let prev = self.size();
        let wanted = pages_to_bytes((prev as usize).saturating_add(delta as usize));
        if wanted > self.bytes.len() {
            log::trace!("linear memory grow: {} -> {} bytes", self.bytes.len(), wanted);
            self.bytes.resize(wanted, 0);
        }
        prev
    }

    // ── Typed loads ──────────────────────────────────────────────────

    #[inline(always)]
    fn read<const N: usize>(&self, addr: usize) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[addr..addr + N]);
        buf
    }

    #[inline(always)]
    pub fn load_i8(&self, addr: usize) -> i8 {
        self.bytes[addr] as i8
    }

    #[inline(always)]
    pub fn load_u8(&self, addr: usize) -> u8 {
        self.bytes[addr]
    }

    #[inline(always)]
    pub fn load_i16(&self, addr: usize) -> i16 {
        i16::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_u16(&self, addr: usize) -> u16 {
        u16::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_i32(&self, addr: usize) -> i32 {
        i32::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_u32(&self, addr: usize) -> u32 {
        u32::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_i64(&self, addr: usize) -> i64 {
        i64::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_f32(&self, addr: usize) -> f32 {
        f32::from_le_bytes(self.read(addr))
    }

    #[inline(always)]
    pub fn load_f64(&self, addr: usize) -> f64 {
        f64::from_le_bytes(self.read(addr))
    }

    // ── Typed stores ─────────────────────────────────────────────────

    #[inline(always)]
    fn write(&mut self, addr: usize, bytes: &[u8]) {
        self.bytes[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    #[inline(always)]
    pub fn store_i8(&mut self, addr: usize, value: i8) {
        self.bytes[addr] = value as u8;
    }

    #[inline(always)]
    pub fn store_i16(&mut self, addr: usize, value: i16) {
        self.write(addr, &value.to_le_bytes());
    }

    #[inline(always)]
    pub fn store_i32(&mut self, addr: usize, value: i32) {
        self.write(addr, &value.to_le_bytes());
    }

    #[inline(always)]
    pub fn store_i64(&mut self, addr: usize, value: i64) {
        self.write(addr, &value.to_le_bytes());
    }

    #[inline(always)]
    pub fn store_f32(&mut self, addr: usize, value: f32) {
        self.write(addr, &value.to_le_bytes());
    }

    #[inline(always)]
    pub fn store_f64(&mut self, addr: usize, value: f64) {
        self.write(addr, &value.to_le_bytes());
    }

    /// Copy `data` into memory starting at `addr`.
    pub fn store_bytes(&mut self, addr: usize, data: &[u8]) {
        self.write(addr, data);
    }

    // ── Go-runtime views ─────────────────────────────────────────────
    //
    // A Go slice or string header in linear memory is a pointer followed by
    // a length, both stored as 64-bit words.

    /// View the bytes of the Go slice whose header is stored at `addr`.
    pub fn load_slice(&self, addr: usize) -> &[u8] {
        let (ptr, len) = self.slice_header(addr);
        &self.bytes[ptr..ptr + len]
    }

    /// Mutable variant of [`load_slice`](Self::load_slice).
    pub fn load_slice_mut(&mut self, addr: usize) -> &mut [u8] {
        let (ptr, len) = self.slice_header(addr);
        &mut self.bytes[ptr..ptr + len]
    }

    /// View `len` bytes starting at `ptr`.
    pub fn load_slice_directly(&self, ptr: usize, len: usize) -> &[u8] {
        &self.bytes[ptr..ptr + len]
    }

    /// Mutable variant of [`load_slice_directly`](Self::load_slice_directly).
    pub fn load_slice_directly_mut(&mut self, ptr: usize, len: usize) -> &mut [u8] {
        &mut self.bytes[ptr..ptr + len]
    }

    /// Decode the Go string whose header is stored at `addr`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the borrowed form is
    /// returned whenever the bytes are already valid.
    pub fn load_string(&self, addr: usize) -> Cow<'_, str> {
        String::from_utf8_lossy(self.load_slice(addr))
    }

    fn slice_header(&self, addr: usize) -> (usize, usize) {
        let ptr = self.load_i64(addr) as usize;
        let len = self.load_i64(addr + 8) as usize;
        (ptr, len)
    }

    // ── Bulk operations ──────────────────────────────────────────────

    /// Compare `len` bytes at `a` and `b`: negative, zero or positive.
    pub fn memcmp(&self, a: usize, b: usize, len: usize) -> i32 {
        match self.bytes[a..a + len].cmp(&self.bytes[b..b + len]) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Absolute address of the first `ch` in `[ptr, ptr + len)`, or 0.
    pub fn memchr(&self, ptr: usize, ch: u8, len: usize) -> usize {
        self.bytes[ptr..ptr + len]
            .iter()
            .position(|&b| b == ch)
            .map_or(0, |i| ptr + i)
    }

    /// Copy `len` bytes from `src` to `dst`; the regions may overlap.
    pub fn memmove(&mut self, dst: usize, src: usize, len: usize) {
        self.bytes.copy_within(src..src + len, dst);
    }

    /// Fill `len` bytes at `dst` with `ch`.
    pub fn memset(&mut self, dst: usize, ch: u8, len: usize) {
        self.bytes[dst..dst + len].fill(ch);
    }

    /// Read-only access to the active memory region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the active memory region.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("pages", &self.size())
            .finish()
    }
}

#[inline]
fn pages_to_bytes(pages: usize) -> usize {
    pages.saturating_mul(PAGE_SIZE).min(MAX_MEMORY_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_PAGES;
    use proptest::prelude::*;

    #[test]
    fn new_initializes_to_zero() {
        let mem = LinearMemory::new(1);
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.size_in_bytes(), PAGE_SIZE);
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn with_data_copies_segments_in_order() {
        let mem = LinearMemory::with_data(
            1,
            &[
                DataSegment {
                    offset: 16,
                    data: b"hello",
                },
                DataSegment {
                    offset: 18,
                    data: b"LL",
                },
            ],
        );
        assert_eq!(mem.load_slice_directly(16, 5), b"heLLo");
    }

    // ── grow ──

    #[test]
    fn grow_returns_previous_size() {
        let mut mem = LinearMemory::new(1);
        assert_eq!(mem.grow(2), 1);
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.grow(0), 3);
        assert_eq!(mem.size(), 3);
    }

    #[test]
    fn grow_zeroes_new_pages() {
        let mut mem = LinearMemory::new(1);
        mem.store_i32(PAGE_SIZE - 4, -1);
        mem.grow(1);
        assert_eq!(mem.load_i32(PAGE_SIZE - 4), -1);
        assert_eq!(mem.load_i64(PAGE_SIZE), 0);
        assert_eq!(mem.load_i64(2 * PAGE_SIZE - 8), 0);
    }

    #[test]
    fn page_sizing_saturates_at_ceiling() {
        // A full 2 GiB allocation is too heavy for a unit test; the clamp
        // lives in this one helper.
        assert_eq!(pages_to_bytes(u32::MAX as usize), MAX_MEMORY_SIZE);
        assert_eq!(pages_to_bytes(MAX_PAGES + 1), MAX_MEMORY_SIZE);
        assert_eq!(pages_to_bytes(MAX_PAGES - 1), MAX_MEMORY_SIZE - PAGE_SIZE);
        assert_eq!(pages_to_bytes(usize::MAX), MAX_MEMORY_SIZE);
    }

    // ── typed access ──

    #[test]
    fn i32_is_little_endian() {
        let mut mem = LinearMemory::new(1);
        mem.store_i32(0, 0x0403_0201);
        assert_eq!(mem.load_u8(0), 1);
        assert_eq!(mem.load_u8(3), 4);
        assert_eq!(mem.load_u16(0), 0x0201);
    }

    #[test]
    fn sign_and_zero_extension() {
        let mut mem = LinearMemory::new(1);
        mem.store_i8(0, -1);
        assert_eq!(mem.load_i8(0), -1);
        assert_eq!(mem.load_u8(0), 0xff);
        mem.store_i16(2, -2);
        assert_eq!(mem.load_i16(2), -2);
        assert_eq!(mem.load_u16(2), 0xfffe);
        mem.store_i32(4, -3);
        assert_eq!(mem.load_u32(4), 0xffff_fffd);
    }

    #[test]
    fn roundtrip_at_start_middle_and_end_of_grown_region() {
        let mut mem = LinearMemory::new(1);
        mem.grow(1);
        let end = mem.size_in_bytes();
        for addr in [0, end / 2, end - 8] {
            mem.store_i64(addr, -0x0123_4567_89ab_cdef);
            assert_eq!(mem.load_i64(addr), -0x0123_4567_89ab_cdef);
            mem.store_f64(addr, -1.5e300);
            assert_eq!(mem.load_f64(addr), -1.5e300);
            mem.store_f32(addr, 3.25);
            assert_eq!(mem.load_f32(addr), 3.25);
            mem.store_i16(addr, i16::MIN);
            assert_eq!(mem.load_i16(addr), i16::MIN);
            mem.store_i8(addr, i8::MIN);
            assert_eq!(mem.load_i8(addr), i8::MIN);
        }
    }

    #[test]
    #[should_panic]
    fn access_beyond_active_size_panics() {
        let mem = LinearMemory::new(1);
        let _ = mem.load_i32(PAGE_SIZE - 2);
    }

    // ── Go views ──

    #[test]
    fn load_slice_and_string_follow_header() {
        let mut mem = LinearMemory::new(1);
        mem.store_bytes(100, "héllo".as_bytes());
        mem.store_i64(8, 100);
        mem.store_i64(16, "héllo".len() as i64);
        assert_eq!(mem.load_slice(8), "héllo".as_bytes());
        assert_eq!(mem.load_string(8), "héllo");

        mem.load_slice_mut(8)[0] = b'H';
        assert_eq!(mem.load_string(8), "Héllo");
    }

    // ── bulk ──

    #[test]
    fn memcmp_orders_bytes() {
        let mut mem = LinearMemory::new(1);
        mem.store_bytes(0, b"abcd");
        mem.store_bytes(8, b"abce");
        assert_eq!(mem.memcmp(0, 8, 3), 0);
        assert_eq!(mem.memcmp(0, 8, 4), -1);
        assert_eq!(mem.memcmp(8, 0, 4), 1);
    }

    #[test]
    fn memchr_returns_absolute_address_or_zero() {
        let mut mem = LinearMemory::new(1);
        mem.store_bytes(40, b"xyz");
        assert_eq!(mem.memchr(40, b'z', 3), 42);
        assert_eq!(mem.memchr(40, b'q', 3), 0);
        assert_eq!(mem.memchr(40, b'z', 2), 0);
    }

    #[test]
    fn memmove_handles_overlap() {
        let mut mem = LinearMemory::new(1);
        mem.store_bytes(0, b"12345");
        mem.memmove(1, 0, 4);
        assert_eq!(mem.load_slice_directly(0, 5), b"11234");
        mem.memmove(0, 1, 4);
        assert_eq!(mem.load_slice_directly(0, 5), b"12344");
    }

    #[test]
    fn memset_fills() {
        let mut mem = LinearMemory::new(1);
        mem.memset(10, 0xaa, 4);
        assert_eq!(mem.load_u32(10), 0xaaaa_aaaa);
        assert_eq!(mem.load_u8(14), 0);
    }

    proptest! {
        #[test]
        fn i32_roundtrip(offset in 0usize..(PAGE_SIZE - 4), value in any::<i32>()) {
            let mut mem = LinearMemory::new(1);
            mem.store_i32(offset, value);
            prop_assert_eq!(mem.load_i32(offset), value);
        }

        #[test]
        fn grow_matches_min_rule(initial in 0u32..8, delta in 0u32..8) {
            let mut mem = LinearMemory::new(initial);
            prop_assert_eq!(mem.grow(delta), initial);
            prop_assert_eq!(mem.size(), (initial + delta).min(MAX_PAGES as u32));
        }
    }
}
