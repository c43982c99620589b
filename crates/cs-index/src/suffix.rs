//! Suffix-array construction over one chunk's bytes.
//!
//! The search is line-oriented, so `\n` must sort before every other byte.
//! `Chunk::finalize` achieves this by temporarily swapping every `\n` to
//! `\0` (the smallest possible byte) before calling [`build`], then restoring
//! it — the suffix *order* is already baked into the returned array of
//! offsets and is unaffected by un-swapping the bytes afterward.
//!
//! Construction is prefix-doubling: `O(n log^2 n)`, not the asymptotically
//! optimal `O(n)` DC3/SA-IS family the original used, but no suffix-array
//! crate exists anywhere in this corpus so this is hand-rolled core domain
//! logic rather than an ambient concern reached from a dependency (see
//! DESIGN.md).

/// Builds a suffix array over `data`: a permutation of `0..data.len()`
/// sorted by the suffix starting at each offset, with a longer suffix
/// sorting after a shorter one when all overlapping bytes are equal.
pub fn build(data: &[u8]) -> Vec<u32> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<i64> = data.iter().map(|&b| b as i64).collect();
    let mut tmp = vec![0i64; n];
    let mut k = 1usize;

    loop {
        let key = |i: u32| -> (i64, i64) {
            let i = i as usize;
            let r1 = rank[i];
            let r2 = if i + k < n { rank[i + k] } else { -1 };
            (r1, r2)
        };
        sa.sort_unstable_by(|&a, &b| key(a).cmp(&key(b)));

        tmp[sa[0] as usize] = 0;
        for idx in 1..n {
            let bump = if key(sa[idx - 1]) < key(sa[idx]) { 1 } else { 0 };
            tmp[sa[idx] as usize] = tmp[sa[idx - 1] as usize] + bump;
        }
        rank.copy_from_slice(&tmp);

        if rank[sa[n - 1] as usize] as usize == n - 1 || k >= n {
            break;
        }
        k *= 2;
    }

    sa
}

/// Compares the suffixes starting at `a` and `b` under the order the search
/// engine relies on: byte-by-byte, with `\n` sorting before any other byte,
/// and a suffix that runs out of bytes first sorting before one that
/// doesn't. Used by the filtered searcher's binary searches, where the
/// actual array has already had `\n` restored (not swapped to `\0`).
pub fn cmp_suffix(data: &[u8], a: u32, b: u32) -> std::cmp::Ordering {
    let sa = &data[a as usize..];
    let sb = &data[b as usize..];
    cmp_line_order(sa, sb)
}

fn order_byte(b: u8) -> u16 {
    if b == b'\n' {
        0
    } else {
        b as u16 + 1
    }
}

fn cmp_line_order(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let mut i = 0;
    loop {
        match (a.get(i), b.get(i)) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(&x), Some(&y)) => {
                let ord = order_byte(x).cmp(&order_byte(y));
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
        }
        i += 1;
    }
}

/// Verifies the suffix-array invariant (property 1 in spec.md §8): every
/// adjacent pair of suffixes compares non-decreasing under `cmp_line_order`.
pub fn is_valid(data: &[u8], sa: &[u32]) -> bool {
    for w in sa.windows(2) {
        if cmp_suffix(data, w[0], w[1]) == std::cmp::Ordering::Greater {
            return false;
        }
    }
    true
}
