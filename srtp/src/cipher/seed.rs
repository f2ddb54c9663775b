//! SEED-128 block cipher (RFC 4269), written against the RustCrypto
//! `cipher` traits so the generic CTR/GCM/CCM wrappers drive it like any
//! other 128-bit block cipher.


use cipher::consts::U16;
use cipher::{BlockCipher, Key, KeyInit, KeySizeUser};

const ROUNDS: usize = 16;

// S-boxes from the RFC 4269 reference code.
const S0: [u8; 256] = [
    0xA9, 0x85, 0xD6, 0xD3, 0x54, 0x1D, 0xAC, 0x25, 0x5D, 0x43, 0x18, 0x1E, 0x51, 0xFC, 0xCA,
    0x63, 0x28, 0x44, 0x20, 0x9D, 0xE0, 0xE2, 0xC8, 0x17, 0xA5, 0x8F, 0x03, 0x7B, 0xBB, 0x13,
    0xD2, 0xEE, 0x70, 0x8C, 0x3F, 0xA8, 0x32, 0xDD, 0xF6, 0x74, 0xEC, 0x95, 0x0B, 0x57, 0x5C,
    0x5B, 0xBD, 0x01, 0x24, 0x1C, 0x73, 0x98, 0x10, 0xCC, 0xF2, 0xD9, 0x2C, 0xE7, 0x72, 0x83,
    0x9B, 0xD1, 0x86, 0xC9, 0x60, 0x50, 0xA3, 0xEB, 0x0D, 0xB6, 0x9E, 0x4F, 0xB7, 0x5A, 0xC6,
    0x78, 0xA6, 0x12, 0xAF, 0xD5, 0x61, 0xC3, 0xB4, 0x41, 0x52, 0x7D, 0x8D, 0x08, 0x1F, 0x99,
    0x00, 0x19, 0x04, 0x53, 0xF7, 0xE1, 0xFD, 0x76, 0x2F, 0x27, 0xB0, 0x8B, 0x0E, 0xAB, 0xA2,
    0x6E, 0x93, 0x4D, 0x69, 0x7C, 0x09, 0x0A, 0xBF, 0xEF, 0xF3, 0xC5, 0x87, 0x14, 0xFE, 0x64,
    0xDE, 0x2E, 0x4B, 0x1A, 0x06, 0x21, 0x6B, 0x66, 0x02, 0xF5, 0x92, 0x8A, 0x0C, 0xB3, 0x7E,
    0xD0, 0x7A, 0x47, 0x96, 0xE5, 0x26, 0x80, 0xAD, 0xDF, 0xA1, 0x30, 0x37, 0xAE, 0x36, 0x15,
    0x22, 0x38, 0xF4, 0xA7, 0x45, 0x4C, 0x81, 0xE9, 0x84, 0x97, 0x35, 0xCB, 0xCE, 0x3C, 0x71,
    0x11, 0xC7, 0x89, 0x75, 0xFB, 0xDA, 0xF8, 0x94, 0x59, 0x82, 0xC4, 0xFF, 0x49, 0x39, 0x67,
    0xC0, 0xCF, 0xD7, 0xB8, 0x0F, 0x8E, 0x42, 0x23, 0x91, 0x6C, 0xDB, 0xA4, 0x34, 0xF1, 0x48,
    0xC2, 0x6F, 0x3D, 0x2D, 0x40, 0xBE, 0x3E, 0xBC, 0xC1, 0xAA, 0xBA, 0x4E, 0x55, 0x3B, 0xDC,
    0x68, 0x7F, 0x9C, 0xD8, 0x4A, 0x56, 0x77, 0xA0, 0xED, 0x46, 0xB5, 0x2B, 0x65, 0xFA, 0xE3,
    0xB9, 0xB1, 0x9F, 0x5E, 0xF9, 0xE6, 0xB2, 0x31, 0xEA, 0x6D, 0x5F, 0xE4, 0xF0, 0xCD, 0x88,
    0x16, 0x3A, 0x58, 0xD4, 0x62, 0x29, 0x07, 0x33, 0xE8, 0x1B, 0x05, 0x79, 0x90, 0x6A, 0x2A,
    0x9A,
];

const S1: [u8; 256] = [
    0x38, 0xE8, 0x2D, 0xA6, 0xCF, 0xDE, 0xB3, 0xB8, 0xAF, 0x60, 0x55, 0xC7, 0x44, 0x6F, 0x6B,
    0x5B, 0xC3, 0x62, 0x33, 0xB5, 0x29, 0xA0, 0xE2, 0xA7, 0xD3, 0x91, 0x11, 0x06, 0x1C, 0xBC,
    0x36, 0x4B, 0xEF, 0x88, 0x6C, 0xA8, 0x17, 0xC4, 0x16, 0xF4, 0xC2, 0x45, 0xE1, 0xD6, 0x3F,
    0x3D, 0x8E, 0x98, 0x28, 0x4E, 0xF6, 0x3E, 0xA5, 0xF9, 0x0D, 0xDF, 0xD8, 0x2B, 0x66, 0x7A,
    0x27, 0x2F, 0xF1, 0x72, 0x42, 0xD4, 0x41, 0xC0, 0x73, 0x67, 0xAC, 0x8B, 0xF7, 0xAD, 0x80,
    0x1F, 0xCA, 0x2C, 0xAA, 0x34, 0xD2, 0x0B, 0xEE, 0xE9, 0x5D, 0x94, 0x18, 0xF8, 0x57, 0xAE,
    0x08, 0xC5, 0x13, 0xCD, 0x86, 0xB9, 0xFF, 0x7D, 0xC1, 0x31, 0xF5, 0x8A, 0x6A, 0xB1, 0xD1,
    0x20, 0xD7, 0x02, 0x22, 0x04, 0x68, 0x71, 0x07, 0xDB, 0x9D, 0x99, 0x61, 0xBE, 0xE6, 0x59,
    0xDD, 0x51, 0x90, 0xDC, 0x9A, 0xA3, 0xAB, 0xD0, 0x81, 0x0F, 0x47, 0x1A, 0xE3, 0xEC, 0x8D,
    0xBF, 0x96, 0x7B, 0x5C, 0xA2, 0xA1, 0x63, 0x23, 0x4D, 0xC8, 0x9E, 0x9C, 0x3A, 0x0C, 0x2E,
    0xBA, 0x6E, 0x9F, 0x5A, 0xF2, 0x92, 0xF3, 0x49, 0x78, 0xCC, 0x15, 0xFB, 0x70, 0x75, 0x7F,
    0x35, 0x10, 0x03, 0x64, 0x6D, 0xC6, 0x74, 0xD5, 0xB4, 0xEA, 0x09, 0x76, 0x19, 0xFE, 0x40,
    0x12, 0xE0, 0xBD, 0x05, 0xFA, 0x01, 0xF0, 0x2A, 0x5E, 0xA9, 0x56, 0x43, 0x85, 0x14, 0x89,
    0x9B, 0xB0, 0xE5, 0x48, 0x79, 0x97, 0xFC, 0x1E, 0x82, 0x21, 0x8C, 0x1B, 0x5F, 0x77, 0x54,
    0xB2, 0x1D, 0x25, 0x4F, 0x00, 0x46, 0xED, 0x58, 0x52, 0xEB, 0x7E, 0xDA, 0xC9, 0xFD, 0x30,
    0x95, 0x65, 0x3C, 0xB6, 0xE4, 0xBB, 0x7C, 0x0E, 0x50, 0x39, 0x26, 0x32, 0x84, 0x69, 0x93,
    0x37, 0xE7, 0x24, 0xA4, 0xCB, 0x53, 0x0A, 0x87, 0xD9, 0x4C, 0x83, 0x8F, 0xCE, 0x3B, 0x4A,
    0xB7,
];

const M0: u32 = 0xFC;
const M1: u32 = 0xF3;
const M2: u32 = 0xCF;
const M3: u32 = 0x3F;

const fn spread(s: u8, a: u32, b: u32, c: u32, d: u32) -> u32 {
    let s = s as u32;
    (s & a) << 24 | (s & b) << 16 | (s & c) << 8 | (s & d)
}

const fn build_ss(select_s1: bool, rot: usize) -> [u32; 256] {
    let masks = [M3, M2, M1, M0];
    let mut out = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let s = if select_s1 { S1[i] } else { S0[i] };
        out[i] = spread(
            s,
            masks[rot % 4],
            masks[(rot + 1) % 4],
            masks[(rot + 2) % 4],
            masks[(rot + 3) % 4],
        );
        i += 1;
    }
    out
}

// Expanded S-boxes: SS0/SS2 spread S0, SS1/SS3 spread S1, with the output
// masks rotated one byte per table.
static SS0: [u32; 256] = build_ss(false, 0);
static SS1: [u32; 256] = build_ss(true, 3);
static SS2: [u32; 256] = build_ss(false, 2);
static SS3: [u32; 256] = build_ss(true, 1);

#[inline(always)]
fn g(x: u32) -> u32 {
    SS0[(x & 0xFF) as usize]
        ^ SS1[(x >> 8 & 0xFF) as usize]
        ^ SS2[(x >> 16 & 0xFF) as usize]
        ^ SS3[(x >> 24 & 0xFF) as usize]
}

#[inline(always)]
fn round(l0: &mut u32, l1: &mut u32, r0: u32, r1: u32, k0: u32, k1: u32) {
    let t0 = r0 ^ k0;
    let mut t1 = r1 ^ k1;
    t1 ^= t0;
    t1 = g(t1);
    let t0 = g(t0.wrapping_add(t1));
    t1 = g(t1.wrapping_add(t0));
    let t0 = t0.wrapping_add(t1);
    *l0 ^= t0;
    *l1 ^= t1;
}

/// SEED-128 block cipher.
#[derive(Clone)]
pub struct Seed {
    rk: [u32; ROUNDS * 2],
}

impl Seed {
    fn expand_key(key: &[u8; 16]) -> [u32; ROUNDS * 2] {
        let mut a = u32::from_be_bytes([key[0], key[1], key[2], key[3]]);
        let mut b = u32::from_be_bytes([key[4], key[5], key[6], key[7]]);
        let mut c = u32::from_be_bytes([key[8], key[9], key[10], key[11]]);
        let mut d = u32::from_be_bytes([key[12], key[13], key[14], key[15]]);

        // Key constants: the golden ratio, rotated left once per round.
        let mut kc = 0x9E37_79B9u32;
        let mut rk = [0u32; ROUNDS * 2];
        for i in 0..ROUNDS {
            rk[2 * i] = g(a.wrapping_add(c).wrapping_sub(kc));
            rk[2 * i + 1] = g(b.wrapping_sub(d).wrapping_add(kc));
            if i % 2 == 0 {
                // Rotate A||B right by 8 bits.
                let t = a;
                a = a >> 8 | b << 24;
                b = b >> 8 | t << 24;
            } else {
                // Rotate C||D left by 8 bits.
                let t = c;
                c = c << 8 | d >> 24;
                d = d << 8 | t >> 24;
            }
            kc = kc.rotate_left(1);
        }
        rk
    }

    fn crypt_block(&self, block: &mut [u8; 16], decrypt: bool) {
        let mut l0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        let mut l1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
        let mut r0 = u32::from_be_bytes([block[8], block[9], block[10], block[11]]);
        let mut r1 = u32::from_be_bytes([block[12], block[13], block[14], block[15]]);

        for i in 0..ROUNDS {
            let pair = if decrypt { ROUNDS - 1 - i } else { i };
            let (k0, k1) = (self.rk[2 * pair], self.rk[2 * pair + 1]);
            if i % 2 == 0 {
                round(&mut l0, &mut l1, r0, r1, k0, k1);
            } else {
                round(&mut r0, &mut r1, l0, l1, k0, k1);
            }
        }

        // Halves are swapped after the final round.
        block[0..4].copy_from_slice(&r0.to_be_bytes());
        block[4..8].copy_from_slice(&r1.to_be_bytes());
        block[8..12].copy_from_slice(&l0.to_be_bytes());
        block[12..16].copy_from_slice(&l1.to_be_bytes());
    }
}

impl KeySizeUser for Seed {
    type KeySize = U16;
}

impl KeyInit for Seed {
    fn new(key: &Key<Self>) -> Self {
        let mut k = [0u8; 16];
        k.copy_from_slice(key.as_slice());
        Seed {
            rk: Self::expand_key(&k),
        }
    }
}

impl BlockCipher for Seed {}

cipher::impl_simple_block_encdec!(
    Seed, U16, cipher, block,
    encrypt: {
        let mut b = [0u8; 16];
        b.copy_from_slice(block.get_in().as_slice());
        cipher.crypt_block(&mut b, false);
        block.get_out().as_mut_slice().copy_from_slice(&b);
    }
    decrypt: {
        let mut b = [0u8; 16];
        b.copy_from_slice(block.get_in().as_slice());
        cipher.crypt_block(&mut b, true);
        block.get_out().as_mut_slice().copy_from_slice(&b);
    }
);
