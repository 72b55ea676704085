//! Directory hash algorithms for HTree indexing
//!
//! Implements the hash functions used by ext4's directory indexing (HTree):
//! - Half MD4
//! - TEA (Tiny Encryption Algorithm)
//! - Legacy hash
//!
//! Each has an "unsigned" variant that treats name bytes as `u8` instead of
//! sign-extending them. Which one a filesystem uses is recorded in the
//! superblock flags; the on-disk root only stores the base version.

use crate::consts::EXT4_NAME_MAX;
use crate::error::{Error, ErrorKind, Result};

/// Hash version constants
pub const EXT2_HTREE_LEGACY: u8 = 0;
pub const EXT2_HTREE_HALF_MD4: u8 = 1;
pub const EXT2_HTREE_TEA: u8 = 2;
pub const EXT2_HTREE_LEGACY_UNSIGNED: u8 = 3;
pub const EXT2_HTREE_HALF_MD4_UNSIGNED: u8 = 4;
pub const EXT2_HTREE_TEA_UNSIGNED: u8 = 5;

/// End-of-directory marker for 31-bit hashes
pub const EXT2_HTREE_EOF: u32 = 0x7FFF_FFFF;

/// Default MD4 initial state, used when the superblock seed is all zero
const DEFAULT_SEED: [u32; 4] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476];

/// Directory hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HashVersion {
    Legacy = EXT2_HTREE_LEGACY,
    HalfMd4 = EXT2_HTREE_HALF_MD4,
    Tea = EXT2_HTREE_TEA,
    LegacyUnsigned = EXT2_HTREE_LEGACY_UNSIGNED,
    HalfMd4Unsigned = EXT2_HTREE_HALF_MD4_UNSIGNED,
    TeaUnsigned = EXT2_HTREE_TEA_UNSIGNED,
}

impl HashVersion {
    /// Decode a raw version byte
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            EXT2_HTREE_LEGACY => Some(Self::Legacy),
            EXT2_HTREE_HALF_MD4 => Some(Self::HalfMd4),
            EXT2_HTREE_TEA => Some(Self::Tea),
            EXT2_HTREE_LEGACY_UNSIGNED => Some(Self::LegacyUnsigned),
            EXT2_HTREE_HALF_MD4_UNSIGNED => Some(Self::HalfMd4Unsigned),
            EXT2_HTREE_TEA_UNSIGNED => Some(Self::TeaUnsigned),
            _ => None,
        }
    }

    /// Raw version byte
    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Whether name bytes are hashed as unsigned
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::LegacyUnsigned | Self::HalfMd4Unsigned | Self::TeaUnsigned
        )
    }
}

/// MD4 F function
#[inline(always)]
fn md4_f(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

/// MD4 G function
#[inline(always)]
fn md4_g(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

/// MD4 H function
#[inline(always)]
fn md4_h(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

/// MD4 Round 1 transformation
macro_rules! ff {
    ($a:expr, $b:expr, $c:expr, $d:expr, $x:expr, $s:expr) => {
        $a = $a.wrapping_add(md4_f($b, $c, $d)).wrapping_add($x).rotate_left($s);
    };
}

/// MD4 Round 2 transformation
macro_rules! gg {
    ($a:expr, $b:expr, $c:expr, $d:expr, $x:expr, $s:expr) => {
        $a = $a
            .wrapping_add(md4_g($b, $c, $d))
            .wrapping_add($x)
            .wrapping_add(0x5A82_7999)
            .rotate_left($s);
    };
}

/// MD4 Round 3 transformation
macro_rules! hh {
    ($a:expr, $b:expr, $c:expr, $d:expr, $x:expr, $s:expr) => {
        $a = $a
            .wrapping_add(md4_h($b, $c, $d))
            .wrapping_add($x)
            .wrapping_add(0x6ED9_EBA1)
            .rotate_left($s);
    };
}

/// Half MD4 transformation over one 32-byte chunk
fn half_md4(hash: &mut [u32; 4], data: &[u32; 8]) {
    let mut a = hash[0];
    let mut b = hash[1];
    let mut c = hash[2];
    let mut d = hash[3];

    // Round 1
    ff!(a, b, c, d, data[0], 3);
    ff!(d, a, b, c, data[1], 7);
    ff!(c, d, a, b, data[2], 11);
    ff!(b, c, d, a, data[3], 19);
    ff!(a, b, c, d, data[4], 3);
    ff!(d, a, b, c, data[5], 7);
    ff!(c, d, a, b, data[6], 11);
    ff!(b, c, d, a, data[7], 19);

    // Round 2
    gg!(a, b, c, d, data[1], 3);
    gg!(d, a, b, c, data[3], 5);
    gg!(c, d, a, b, data[5], 9);
    gg!(b, c, d, a, data[7], 13);
    gg!(a, b, c, d, data[0], 3);
    gg!(d, a, b, c, data[2], 5);
    gg!(c, d, a, b, data[4], 9);
    gg!(b, c, d, a, data[6], 13);

    // Round 3
    hh!(a, b, c, d, data[3], 3);
    hh!(d, a, b, c, data[7], 9);
    hh!(c, d, a, b, data[2], 11);
    hh!(b, c, d, a, data[6], 15);
    hh!(a, b, c, d, data[1], 3);
    hh!(d, a, b, c, data[5], 9);
    hh!(c, d, a, b, data[0], 11);
    hh!(b, c, d, a, data[4], 15);

    hash[0] = hash[0].wrapping_add(a);
    hash[1] = hash[1].wrapping_add(b);
    hash[2] = hash[2].wrapping_add(c);
    hash[3] = hash[3].wrapping_add(d);
}

/// TEA transformation over one 16-byte chunk (16 cycles)
fn tea(hash: &mut [u32; 4], data: &[u32; 4]) {
    const TEA_DELTA: u32 = 0x9E37_79B9;
    let mut x = hash[0];
    let mut y = hash[1];
    let mut sum = 0u32;

    for _ in 0..16 {
        sum = sum.wrapping_add(TEA_DELTA);
        x = x.wrapping_add(
            (y << 4).wrapping_add(data[0]) ^ y.wrapping_add(sum) ^ (y >> 5).wrapping_add(data[1]),
        );
        y = y.wrapping_add(
            (x << 4).wrapping_add(data[2]) ^ x.wrapping_add(sum) ^ (x >> 5).wrapping_add(data[3]),
        );
    }

    hash[0] = hash[0].wrapping_add(x);
    hash[1] = hash[1].wrapping_add(y);
}

#[inline(always)]
fn name_byte(byte: u8, unsigned_char: bool) -> u32 {
    if unsigned_char {
        byte as u32
    } else {
        byte as i8 as i32 as u32
    }
}

/// Legacy hash algorithm
fn legacy_hash(name: &[u8], unsigned_char: bool) -> u32 {
    const MULTI: u32 = 0x6D_22F5;
    let mut h1 = 0x12A3_FE2D_u32;
    let mut h2 = 0x37AB_E8F9_u32;

    for &byte in name {
        let val = name_byte(byte, unsigned_char);
        let mut h0 = h2.wrapping_add(h1 ^ val.wrapping_mul(MULTI));
        if h0 & 0x8000_0000 != 0 {
            h0 = h0.wrapping_sub(0x7FFF_FFFF);
        }
        h2 = h1;
        h1 = h0;
    }

    h1 << 1
}

/// Pack the remaining name bytes into hash input words
///
/// Bytes are shifted in big-endian order on top of a padding word made of
/// the remaining length repeated in every byte. Words past the end of the
/// name are filled with the padding.
fn prep_hashbuf(src: &[u8], dst: &mut [u32], unsigned_char: bool) {
    let slen = src.len() as u32;
    let padding = slen | (slen << 8) | (slen << 16) | (slen << 24);
    let len = src.len().min(dst.len() * 4);

    let mut buf_val = padding;
    for (i, &byte) in src[..len].iter().enumerate() {
        if i % 4 == 0 {
            buf_val = padding;
        }
        buf_val = (buf_val << 8).wrapping_add(name_byte(byte, unsigned_char));
        if i % 4 == 3 {
            dst[i / 4] = buf_val;
            buf_val = padding;
        }
    }

    let full_words = len / 4;
    if full_words < dst.len() {
        dst[full_words] = buf_val;
        for word in &mut dst[full_words + 1..] {
            *word = padding;
        }
    }
}

/// Compute the `(major, minor)` hash of a directory entry name
///
/// `hash_seed` is the superblock's `s_hash_seed`; `None` or an all-zero seed
/// selects the default initial state. The major hash always has its low bit
/// clear, and never equals `EXT2_HTREE_EOF << 1`.
///
/// # Errors
///
/// `InvalidInput` if the name is empty or longer than 255 bytes.
pub fn htree_hash(
    name: &[u8],
    hash_seed: Option<&[u32; 4]>,
    hash_version: HashVersion,
) -> Result<(u32, u32)> {
    if name.is_empty() || name.len() > EXT4_NAME_MAX {
        return Err(Error::new(ErrorKind::InvalidInput, "Name length must be 1-255"));
    }

    let mut hash = match hash_seed {
        Some(seed) if seed.iter().any(|&w| w != 0) => *seed,
        _ => DEFAULT_SEED,
    };
    let unsigned_char = hash_version.is_unsigned();

    let (major, minor) = match hash_version {
        HashVersion::Legacy | HashVersion::LegacyUnsigned => (legacy_hash(name, unsigned_char), 0),

        HashVersion::HalfMd4 | HashVersion::HalfMd4Unsigned => {
            let mut rest = name;
            while !rest.is_empty() {
                let mut data = [0u32; 8];
                prep_hashbuf(rest, &mut data, unsigned_char);
                half_md4(&mut hash, &data);
                rest = &rest[rest.len().min(32)..];
            }
            (hash[1], hash[2])
        }

        HashVersion::Tea | HashVersion::TeaUnsigned => {
            let mut rest = name;
            while !rest.is_empty() {
                let mut data = [0u32; 4];
                prep_hashbuf(rest, &mut data, unsigned_char);
                tea(&mut hash, &data);
                rest = &rest[rest.len().min(16)..];
            }
            (hash[0], hash[1])
        }
    };

    let mut major = major & !1;
    if major == EXT2_HTREE_EOF << 1 {
        major = (EXT2_HTREE_EOF - 1) << 1;
    }

    Ok((major, minor))
}
