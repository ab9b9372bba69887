// Copyright 2025 the Onyx Engine authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! 64-bit incremental hash combinators used for GPU object cache keys.
//!
//! All cache keys in the renderer are built by folding the relevant fields of
//! an info struct through these helpers, starting from [`SEED`]. The scheme is
//! FNV-1a with a 64-bit prime; it is not cryptographic, it only needs to be
//! stable within a process and cheap to compute every draw.

/// Starting value for a key computation.
pub const SEED: u64 = 0xcbf2_9ce4_8422_2325;

const PRIME: u64 = 0x0000_0100_0000_01b3;

#[inline]
fn mix(state: u64, byte: u8) -> u64 {
    (state ^ u64::from(byte)).wrapping_mul(PRIME)
}

/// Folds a byte slice into the hash state.
#[inline]
pub fn add_bytes(mut state: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        state = mix(state, b);
    }
    state
}

/// Folds a `u32` into the hash state.
#[inline]
pub fn add_u32(state: u64, value: u32) -> u64 {
    add_bytes(state, &value.to_le_bytes())
}

/// Folds a `u64` into the hash state.
#[inline]
pub fn add_u64(state: u64, value: u64) -> u64 {
    add_bytes(state, &value.to_le_bytes())
}

/// Folds an `i32` into the hash state.
#[inline]
pub fn add_i32(state: u64, value: i32) -> u64 {
    add_bytes(state, &value.to_le_bytes())
}

/// Folds an `f32` into the hash state by bit pattern.
///
/// `-0.0` and `0.0` hash differently; callers that want them unified should
/// normalise before hashing. Cache keys only require that equal state structs
/// produce equal keys, which bit-pattern hashing guarantees.
#[inline]
pub fn add_f32(state: u64, value: f32) -> u64 {
    add_bytes(state, &value.to_bits().to_le_bytes())
}

/// Folds a `usize` (handle index) into the hash state.
#[inline]
pub fn add_usize(state: u64, value: usize) -> u64 {
    add_u64(state, value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_inputs_hash_equal() {
        let a = add_u32(add_u64(SEED, 42), 7);
        let b = add_u32(add_u64(SEED, 42), 7);
        assert_eq!(a, b);
    }

    #[test]
    fn order_matters() {
        let a = add_u32(add_u32(SEED, 1), 2);
        let b = add_u32(add_u32(SEED, 2), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn float_bit_patterns() {
        assert_eq!(add_f32(SEED, 1.5), add_f32(SEED, 1.5));
        assert_ne!(add_f32(SEED, 1.5), add_f32(SEED, -1.5));
    }

    #[test]
    fn empty_bytes_are_identity() {
        assert_eq!(add_bytes(SEED, &[]), SEED);
    }
}
