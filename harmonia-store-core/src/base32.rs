// SPDX-FileCopyrightText: 2024 griff (original Nix.rs)
// SPDX-FileCopyrightText: 2026 Jörg Thalheim (Harmonia adaptation)
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Nix base32 encoding/decoding.

use data_encoding::{BitOrder, DecodeError, Encoding, Specification};
use std::sync::LazyLock;

/// The 32-character alphabet used by Nix's base32 encoding.
pub const ALPHABET: &str = "0123456789abcdfghijklmnpqrsvwxyz";

/// Nix base32 encoding (lowercase, without padding, LSB first, reversed)
static NIX_BASE32: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(ALPHABET);
    spec.bit_order = BitOrder::LeastSignificantFirst;
    spec.encoding().expect("nix base32 specification is valid")
});

pub const fn encode_len(len: usize) -> usize {
    (8 * len).div_ceil(5)
}

/// Returns true if `c` is part of the nix base32 alphabet.
pub fn is_valid_char(c: u8) -> bool {
    ALPHABET.as_bytes().contains(&c)
}

pub fn encode_string(input: &[u8]) -> String {
    NIX_BASE32.encode(input).chars().rev().collect()
}

pub fn decode(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reversed = input.to_vec();
    reversed.reverse();
    NIX_BASE32.decode(&reversed).map_err(|err| DecodeError {
        // Report the position in the caller's (unreversed) input
        position: input.len().saturating_sub(err.position + 1),
        kind: err.kind,
    })
}
