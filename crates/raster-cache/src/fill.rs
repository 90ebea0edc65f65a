//! Compare-and-fill primitives.
//!
//! Each primitive walks `cols` of a cache buffer. In checked mode it
//! skips the leading run of equal bytes, then writes every byte that
//! differs while remembering the last one, so the reported span starts at
//! the first mismatch and ends at the last. Unchecked mode copies the whole
//! range and reports all of it dirty.

use std::ops::Range;

use crate::span::{DirtySpan, FillResult, SpanAccumulator};

/// Strided, masked view into a source buffer:
/// column `i` reads `src[(base + i * stride) & mask]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedSource {
    pub base: usize,
    pub stride: usize,
    pub mask: usize,
}

impl IndexedSource {
    /// Contiguous bytes from `base`, wrapping at `mask`.
    #[must_use]
    pub fn linear(base: usize, mask: usize) -> Self {
        Self {
            base,
            stride: 1,
            mask,
        }
    }

    fn index(self, i: usize) -> usize {
        (self.base + i * self.stride) & self.mask
    }
}

fn fill_with(
    dest: &mut [u8],
    cols: Range<usize>,
    acc: &mut SpanAccumulator,
    no_check: bool,
    value: impl Fn(usize) -> u8,
) -> FillResult {
    if cols.is_empty() {
        return FillResult::CLEAN;
    }
    let start = cols.start;
    let run = &mut dest[cols];

    if no_check {
        for (i, byte) in run.iter_mut().enumerate() {
            *byte = value(i);
        }
        let span = DirtySpan::new(start, start + run.len() - 1);
        acc.include(span);
        return FillResult {
            changed: true,
            span: Some(span),
        };
    }

    let Some(first) = (0..run.len()).find(|&i| run[i] != value(i)) else {
        return FillResult::CLEAN;
    };
    let mut last = first;
    for i in first..run.len() {
        let v = value(i);
        if run[i] != v {
            run[i] = v;
            last = i;
        }
    }
    let span = DirtySpan::new(start + first, start + last);
    acc.include(span);
    FillResult {
        changed: true,
        span: Some(span),
    }
}

/// Every column in `cols` takes `value`. Used for border and blank runs.
pub fn fill_const(
    dest: &mut [u8],
    cols: Range<usize>,
    value: u8,
    acc: &mut SpanAccumulator,
    no_check: bool,
) -> FillResult {
    fill_with(dest, cols, acc, no_check, |_| value)
}

/// Column `cols.start + i` takes `src[(base + i * stride) & mask]`.
///
/// # Panics
///
/// If `mask` reaches past the end of `src`.
pub fn fill_indexed(
    dest: &mut [u8],
    cols: Range<usize>,
    src: &[u8],
    source: IndexedSource,
    acc: &mut SpanAccumulator,
    no_check: bool,
) -> FillResult {
    assert!(
        source.mask < src.len(),
        "source mask {:#X} exceeds a {}-byte buffer",
        source.mask,
        src.len()
    );
    fill_with(dest, cols, acc, no_check, |i| src[source.index(i)])
}

/// Compare a freshly rendered run against the cache.
///
/// # Panics
///
/// If `fresh` is shorter than `cols`.
pub fn fill_from(
    dest: &mut [u8],
    cols: Range<usize>,
    fresh: &[u8],
    acc: &mut SpanAccumulator,
    no_check: bool,
) -> FillResult {
    assert!(fresh.len() >= cols.len(), "fresh run shorter than range");
    fill_with(dest, cols, acc, no_check, |i| fresh[i])
}
