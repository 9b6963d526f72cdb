//! Per-call configuration for a break run
//!
//! The engine is a pure function of `(element list, config)`; everything
//! that the original tuned through instance or process-wide state is passed
//! here explicitly. A `BreakConfig` is cheap to clone and never mutated by
//! the engine.

/// Available size per line or page, in millipoints.
///
/// Sizes may vary per line (indents, differing page heights); the last
/// entry of a per-line table repeats for all following lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineWidths {
  Constant(i32),
  PerLine(Vec<i32>),
}

impl LineWidths {
  /// The target size for the given zero-based line number.
  pub fn get(&self, line: usize) -> i32 {
    match self {
      LineWidths::Constant(w) => *w,
      LineWidths::PerLine(widths) => widths
        .get(line)
        .or_else(|| widths.last())
        .copied()
        .unwrap_or(0),
    }
  }
}

impl Default for LineWidths {
  fn default() -> Self {
    LineWidths::Constant(0)
  }
}

/// Constraint parameters and demerit tuning for one break run.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakConfig {
  /// Available size per line/page.
  pub line_widths: LineWidths,
  /// Upper bound on the adjustment ratio for a candidate to be considered
  /// acceptable. Ratios above it only survive at forced breaks or through
  /// emergency recovery. The lower bound is always -1 (content cannot be
  /// compressed beyond available shrink).
  pub threshold: f64,
  /// When true (the default), the search always completes: if no feasible
  /// candidate exists between two forced breaks, an overfull break is
  /// emitted at the point of maximum feasible content. When false the run
  /// fails with `Error::NoFeasibleBreaks` instead.
  pub force: bool,
  /// When false, flagged penalties (hyphenation opportunities) are not
  /// legal break points.
  pub hyphenation_allowed: bool,
  /// Minimum number of boxes in the first produced segment. Values of 0 or
  /// 1 disable the constraint. Enforced by a repair pass, see
  /// `constraints::break_with_page_constraints`.
  pub min_orphans: usize,
  /// Minimum number of boxes in the last produced segment.
  pub min_widows: usize,
  /// Demerit added when two consecutive breaks both occur at flagged
  /// penalties.
  pub repeated_flagged_demerit: f64,
  /// Demerit added when consecutive lines fall in fitness classes more
  /// than one bucket apart.
  pub incompatible_fitness_demerit: f64,
}

impl BreakConfig {
  /// Creates a configuration with a constant available size and default
  /// tuning.
  pub fn new(line_width: i32) -> Self {
    Self {
      line_widths: LineWidths::Constant(line_width),
      ..Self::default()
    }
  }

  pub fn with_line_widths(mut self, widths: LineWidths) -> Self {
    self.line_widths = widths;
    self
  }

  pub fn with_threshold(mut self, threshold: f64) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_widows_orphans(mut self, min_widows: usize, min_orphans: usize) -> Self {
    self.min_widows = min_widows;
    self.min_orphans = min_orphans;
    self
  }
}

impl Default for BreakConfig {
  fn default() -> Self {
    Self {
      line_widths: LineWidths::default(),
      threshold: 1.0,
      force: true,
      hyphenation_allowed: true,
      min_orphans: 1,
      min_widows: 1,
      repeated_flagged_demerit: 50.0,
      incompatible_fitness_demerit: 50.0,
    }
  }
}
