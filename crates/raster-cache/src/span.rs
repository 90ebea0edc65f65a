//! Dirty column ranges.

/// Inclusive column range `[xs, xe]` of a scanline that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtySpan {
    pub xs: usize,
    pub xe: usize,
}

impl DirtySpan {
    /// # Panics
    ///
    /// If `xs > xe`.
    #[must_use]
    pub fn new(xs: usize, xe: usize) -> Self {
        assert!(xs <= xe, "dirty span {xs}..={xe} is inverted");
        Self { xs, xe }
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.xe - self.xs + 1
    }

    /// Never true; a span always covers at least one column.
    #[must_use]
    pub fn is_empty(self) -> bool {
        false
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            xs: self.xs.min(other.xs),
            xe: self.xe.max(other.xe),
        }
    }

    #[must_use]
    pub fn contains(self, x: usize) -> bool {
        (self.xs..=self.xe).contains(&x)
    }
}

/// Running span for one scanline. It only ever widens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanAccumulator(Option<DirtySpan>);

impl SpanAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self(None)
    }

    /// Widen to cover `span`.
    pub fn include(&mut self, span: DirtySpan) {
        self.0 = Some(match self.0 {
            Some(current) => current.union(span),
            None => span,
        });
    }

    #[must_use]
    pub fn span(self) -> Option<DirtySpan> {
        self.0
    }

    #[must_use]
    pub fn is_clean(self) -> bool {
        self.0.is_none()
    }
}

/// Outcome of one fill primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillResult {
    /// At least one byte differed (or the fill was unchecked).
    pub changed: bool,
    /// Columns this call touched, before merging into the accumulator.
    pub span: Option<DirtySpan>,
}

impl FillResult {
    pub const CLEAN: Self = Self {
        changed: false,
        span: None,
    };
}
