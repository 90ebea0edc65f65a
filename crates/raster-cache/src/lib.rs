//! Raster line cache.
//!
//! A video chip renders each scanline into a byte buffer of palette
//! indices. The cache keeps last frame's bytes for every visible line,
//! plus the memory and register values the line was built from, so a
//! renderer can tell which columns actually changed. Only those dirty
//! spans travel to a [`FrameSink`].
//!
//! The fill primitives all follow the same contract: compare the new
//! values against the cached bytes, write the ones that differ and widen
//! a [`SpanAccumulator`] to cover them. Several fills on one line (border,
//! graphics, border) share one accumulator, so the span it ends with is
//! the tightest range covering every changed byte.

mod cache;
mod fill;
mod sink;
mod span;

pub use cache::{CacheLine, RasterCache};
pub use fill::{IndexedSource, fill_const, fill_from, fill_indexed};
pub use sink::{
    ChannelSink, Frame, FrameSink, FrameSnapshot, FrameStatus, FullFrameSink, NullSink,
};
pub use span::{DirtySpan, FillResult, SpanAccumulator};
