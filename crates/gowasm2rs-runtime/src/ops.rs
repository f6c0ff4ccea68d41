//! Wasm numeric operations that require runtime checks.
//!
//! ## Float-to-integer truncation
//!
//! Rust's `as` cast from float to integer saturates (and maps NaN to 0),
//! which is exactly `trunc_sat`. The trapping `trunc` forms validate the
//! input first: NaN and out-of-range values trap with `IntegerOverflow`.
//!
//! ## Integer division / remainder
//!
//! Division by zero traps with `DivisionByZero`; `MIN / -1` traps with
//! `IntegerOverflow`. `MIN rem_s -1` is defined as 0 and does not trap.
//!
//! ## Float min / max
//!
//! Wasm `min`/`max` propagate NaN and order `-0.0` below `+0.0`; Rust's
//! `f32::min` does neither. `nearest` rounds ties to even, unlike `round`.

use crate::{WasmResult, WasmTrap};

// ── Float → integer trapping truncation ──────────────────────────────────────

macro_rules! trapping_trunc {
    ($(#[$doc:meta])* $name:ident, $from:ty => $via:ty as $to:ty, lower: $lo:expr, upper: $hi:expr) => {
        $(#[$doc])*
        #[inline(never)]
        pub fn $name(v: $from) -> WasmResult<$to> {
            if v.is_nan() || v >= $hi || v <= $lo {
                return Err(WasmTrap::IntegerOverflow);
            }
            Ok(v as $via as $to)
        }
    };
}

// Bounds are exclusive on both sides. The signed lower bound is the first
// value below MIN that truncates out of range: for f64 and i32 that is
// MIN - 1, while for every other pairing MIN - 1 rounds to MIN itself, so
// the next representable value below MIN is used.
trapping_trunc!(
    /// Wasm `i32.trunc_f32_s`.
    i32_trunc_f32_s, f32 => i32 as i32, lower: -2147483904.0f32, upper: 2147483648.0f32
);
trapping_trunc!(
    /// Wasm `i32.trunc_f32_u`. `-0.5` truncates to 0, so only `<= -1.0` traps.
    i32_trunc_f32_u, f32 => u32 as i32, lower: -1.0f32, upper: 4294967296.0f32
);
trapping_trunc!(
    /// Wasm `i32.trunc_f64_s`.
    i32_trunc_f64_s, f64 => i32 as i32, lower: -2147483649.0f64, upper: 2147483648.0f64
);
trapping_trunc!(
    /// Wasm `i32.trunc_f64_u`.
    i32_trunc_f64_u, f64 => u32 as i32, lower: -1.0f64, upper: 4294967296.0f64
);
trapping_trunc!(
    /// Wasm `i64.trunc_f32_s`.
    i64_trunc_f32_s, f32 => i64 as i64, lower: -9223373136366403584.0f32, upper: 9223372036854775808.0f32
);
trapping_trunc!(
    /// Wasm `i64.trunc_f32_u`.
    i64_trunc_f32_u, f32 => u64 as i64, lower: -1.0f32, upper: 18446744073709551616.0f32
);
trapping_trunc!(
    /// Wasm `i64.trunc_f64_s`.
    i64_trunc_f64_s, f64 => i64 as i64, lower: -9223372036854777856.0f64, upper: 9223372036854775808.0f64
);
trapping_trunc!(
    /// Wasm `i64.trunc_f64_u`.
    i64_trunc_f64_u, f64 => u64 as i64, lower: -1.0f64, upper: 18446744073709551616.0f64
);

// ── Integer division / remainder ─────────────────────────────────────────────

macro_rules! int_div_rem {
    ($int:ty, $uint:ty, $div_s:ident, $div_u:ident, $rem_s:ident, $rem_u:ident) => {
        /// Signed division; traps on zero divisor and on `MIN / -1`.
        #[inline(never)]
        pub fn $div_s(lhs: $int, rhs: $int) -> WasmResult<$int> {
            if rhs == 0 {
                return Err(WasmTrap::DivisionByZero);
            }
            lhs.checked_div(rhs).ok_or(WasmTrap::IntegerOverflow)
        }

        /// Unsigned division; traps on zero divisor.
        #[inline(never)]
        pub fn $div_u(lhs: $int, rhs: $int) -> WasmResult<$int> {
            (lhs as $uint)
                .checked_div(rhs as $uint)
                .map(|v| v as $int)
                .ok_or(WasmTrap::DivisionByZero)
        }

        /// Signed remainder; traps on zero divisor. `MIN rem_s -1` is 0.
        #[inline(never)]
        pub fn $rem_s(lhs: $int, rhs: $int) -> WasmResult<$int> {
            if rhs == 0 {
                return Err(WasmTrap::DivisionByZero);
            }
            Ok(lhs.wrapping_rem(rhs))
        }

        /// Unsigned remainder; traps on zero divisor.
        #[inline(never)]
        pub fn $rem_u(lhs: $int, rhs: $int) -> WasmResult<$int> {
            (lhs as $uint)
                .checked_rem(rhs as $uint)
                .map(|v| v as $int)
                .ok_or(WasmTrap::DivisionByZero)
        }
    };
}

int_div_rem!(i32, u32, i32_div_s, i32_div_u, i32_rem_s, i32_rem_u);
int_div_rem!(i64, u64, i64_div_s, i64_div_u, i64_rem_s, i64_rem_u);

// ── Float min / max ──────────────────────────────────────────────────────────

macro_rules! float_min_max {
    ($float:ty, $min:ident, $max:ident) => {
        /// Wasm `min`: NaN if either operand is NaN; `min(-0, +0) == -0`.
        #[inline]
        pub fn $min(lhs: $float, rhs: $float) -> $float {
            if lhs.is_nan() || rhs.is_nan() {
                return <$float>::NAN;
            }
            if lhs == rhs {
                // Only differs from `lhs` for a pair of signed zeros.
                return <$float>::from_bits(lhs.to_bits() | rhs.to_bits());
            }
            if lhs < rhs {
                lhs
            } else {
                rhs
            }
        }

        /// Wasm `max`: NaN if either operand is NaN; `max(-0, +0) == +0`.
        #[inline]
        pub fn $max(lhs: $float, rhs: $float) -> $float {
            if lhs.is_nan() || rhs.is_nan() {
                return <$float>::NAN;
            }
            if lhs == rhs {
                return <$float>::from_bits(lhs.to_bits() & rhs.to_bits());
            }
            if lhs > rhs {
                lhs
            } else {
                rhs
            }
        }
    };
}

float_min_max!(f32, f32_min, f32_max);
float_min_max!(f64, f64_min, f64_max);

/// Wasm `f32.nearest`: round to integer, ties to even.
#[inline]
pub fn f32_nearest(v: f32) -> f32 {
    v.round_ties_even()
}

/// Wasm `f64.nearest`: round to integer, ties to even.
#[inline]
pub fn f64_nearest(v: f64) -> f64 {
    v.round_ties_even()
}
