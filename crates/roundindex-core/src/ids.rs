//! Deterministic identifiers.
//!
//! Asset ids must match the round contracts bit for bit: the receipt token
//! id of a deposit IS the asset id read as a `uint256`. Strategy ids only
//! need to be stable within one deployment.

use alloy_primitives::{Address, B256, U256};
use tiny_keccak::{Hasher, Keccak};

use crate::entity::AssetType;
use crate::error::DecodeError;

/// Asset id of the native currency.
pub const NATIVE_ASSET_ID: B256 = B256::ZERO;

/// Suffix of the timed round config key.
pub const TIMED_ROUND_CONFIG_SUFFIX: &str = "timed-round-config";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

// ─── Key rendering ────────────────────────────────────────────────────────────

/// Lowercase `0x`-prefixed hex of raw bytes.
pub fn hex_key(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn address_key(address: &Address) -> String {
    hex_key(address.as_slice())
}

/// A 256-bit word as `0x` + 64 hex digits.
pub fn word_key(word: &U256) -> String {
    hex_key(&word.to_be_bytes::<32>())
}

/// Join key parts with `-`.
pub fn compose(parts: &[&str]) -> String {
    parts.join("-")
}

/// The low 20 bytes of a word, e.g. a house address carried as a token id.
pub fn address_from_word(word: &U256) -> Address {
    let bytes = word.to_be_bytes::<32>();
    Address::from_slice(&bytes[12..])
}

pub fn timed_round_config_key(round: &str) -> String {
    compose(&[round, TIMED_ROUND_CONFIG_SUFFIX])
}

// ─── Asset ids ────────────────────────────────────────────────────────────────

/// Compute the 32-byte asset id.
///
/// - `NATIVE`: all zeros.
/// - `ERC20`: type byte, then the token address, zero-padded on the right.
/// - `ERC721`/`ERC1155`: type byte, then the first 31 bytes of
///   `keccak256(token ++ identifier as 32-byte big-endian)`.
pub fn asset_id(asset_type: AssetType, token: &Address, identifier: &U256) -> B256 {
    let mut id = [0u8; 32];
    match asset_type {
        AssetType::Native => return NATIVE_ASSET_ID,
        AssetType::Erc20 => {
            id[0] = asset_type.type_byte();
            id[1..21].copy_from_slice(token.as_slice());
        }
        AssetType::Erc721 | AssetType::Erc1155 => {
            let mut preimage = [0u8; 52];
            preimage[..20].copy_from_slice(token.as_slice());
            preimage[20..].copy_from_slice(&identifier.to_be_bytes::<32>());
            let digest = keccak256(&preimage);
            id[0] = asset_type.type_byte();
            id[1..].copy_from_slice(&digest[..31]);
        }
    }
    B256::from(id)
}

/// Asset id rendered as an entity key.
pub fn asset_key(asset_type: AssetType, token: &Address, identifier: &U256) -> String {
    hex_key(asset_id(asset_type, token, identifier).as_slice())
}

/// Asset key for a round receipt token id.
pub fn asset_key_from_token_id(token_id: &U256) -> String {
    word_key(token_id)
}

// ─── Strategy ids ─────────────────────────────────────────────────────────────

/// Content hash of a governance-power strategy.
///
/// `keccak256` over the UTF-8 string `<address>:<p0>:<p1>:...`, where the
/// address is rendered as `0x` + 64 lowercase hex digits and every param in
/// decimal. A strategy with no params hashes just the address.
pub fn strategy_id(address: &U256, params: &[U256]) -> String {
    let mut preimage = word_key(address);
    for param in params {
        preimage.push(':');
        preimage.push_str(&param.to_string());
    }
    hex_key(&keccak256(preimage.as_bytes()))
}

// ─── Flattened 2D arrays ──────────────────────────────────────────────────────

fn word_to_usize(word: &U256) -> Option<usize> {
    let limbs = word.as_limbs();
    if limbs[1..].iter().any(|l| *l != 0) {
        return None;
    }
    usize::try_from(limbs[0]).ok()
}

/// Decode `[n, off_0, .., off_{n-1}, data..]` into `n` sub-arrays.
///
/// Offsets index into `data`, which starts at position `1 + n` of `flat`.
/// Sub-array `i` spans `data[off_i..off_{i+1}]`; the last one ends at
/// `data.len()`. An empty input decodes to no sub-arrays.
pub fn decode_flattened_2d(flat: &[U256]) -> Result<Vec<Vec<U256>>, DecodeError> {
    let Some(first) = flat.first() else {
        return Ok(Vec::new());
    };
    let count = word_to_usize(first).ok_or_else(|| DecodeError::CountOverflow(first.to_string()))?;
    let header = count
        .checked_add(1)
        .filter(|h| *h <= flat.len())
        .ok_or(DecodeError::HeaderTooShort {
            count,
            len: flat.len(),
        })?;

    let data = &flat[header..];
    let mut offsets = Vec::with_capacity(count);
    for (index, raw) in flat[1..header].iter().enumerate() {
        let offset = word_to_usize(raw)
            .filter(|o| *o <= data.len())
            .ok_or_else(|| DecodeError::OffsetOutOfRange {
                index,
                offset: raw.to_string(),
                data_len: data.len(),
            })?;
        if offsets.last().is_some_and(|prev| offset < *prev) {
            return Err(DecodeError::DecreasingOffset { index });
        }
        offsets.push(offset);
    }

    Ok(offsets
        .iter()
        .enumerate()
        .map(|(i, start)| {
            let end = offsets.get(i + 1).copied().unwrap_or(data.len());
            data[*start..end].to_vec()
        })
        .collect())
}

/// Inverse of [`decode_flattened_2d`], as produced by the registering call.
#[cfg(test)]
pub(crate) fn flatten_2d(arrays: &[Vec<U256>]) -> Vec<U256> {
    let mut flat = Vec::with_capacity(1 + arrays.len() + arrays.iter().map(Vec::len).sum::<usize>());
    flat.push(U256::from(arrays.len()));
    let mut offset = 0usize;
    for array in arrays {
        flat.push(U256::from(offset));
        offset += array.len();
    }
    for array in arrays {
        flat.extend_from_slice(array);
    }
    flat
}
