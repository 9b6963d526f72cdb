//! Feasible breakpoint scanning
//!
//! One left-to-right pass over an element list, maintaining running sums of
//! natural width, stretch, and shrink, and yielding every legal break
//! candidate together with the cumulative sums on both sides of the break.
//! The path search in `breaker` evaluates candidate transitions against
//! these sums; the adjustment-ratio and fitness-class rules live here so
//! they stay pure functions shared by both passes.

use crate::config::BreakConfig;
use crate::element::{Element, ElementList, INFINITE_PENALTY};

/// Clamp applied to adjustment ratios when no stretch (or shrink) is
/// available. Large enough to lose against any real ratio, small enough to
/// keep demerit arithmetic finite.
pub const INFINITE_RATIO: f64 = 1000.0;

/// Cumulative width/stretch/shrink totals from the start of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunningSums {
  pub width: i32,
  pub stretch: i32,
  pub shrink: i32,
}

impl RunningSums {
  fn add_glue(&mut self, width: i32, stretch: i32, shrink: i32) {
    self.width += width;
    self.stretch += stretch;
    self.shrink += shrink;
  }
}

/// One legal break candidate discovered by the scan.
///
/// `before` holds the running sums up to but excluding the break element;
/// `after` holds the sums a segment starting after this break resumes from,
/// advanced past the discardable glue/penalty run that follows the break.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScannedCandidate {
  /// Index of the break element. Equal to `list.len()` for the synthetic
  /// end-of-list break appended when the list does not end in a forced
  /// penalty.
  pub index: usize,
  pub before: RunningSums,
  pub after: RunningSums,
  /// Width charged only when the break is taken (a visible hyphen).
  pub penalty_width: i32,
  /// Penalty value; 0 for glue breaks.
  pub penalty_value: i32,
  pub flagged: bool,
  pub forced: bool,
}

/// Coarse looseness bucket derived from the adjustment ratio, used to
/// penalize abrupt density changes between adjacent lines or pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FitnessClass {
  Tight,
  Normal,
  Loose,
  VeryLoose,
}

impl FitnessClass {
  /// Bucket boundaries are -0.5, 0.5, and 1.0, closed on the right, and
  /// deterministic on exact boundary values.
  pub fn from_ratio(r: f64) -> Self {
    if r < -0.5 {
      FitnessClass::Tight
    } else if r <= 0.5 {
      FitnessClass::Normal
    } else if r <= 1.0 {
      FitnessClass::Loose
    } else {
      FitnessClass::VeryLoose
    }
  }

  pub(crate) fn index(self) -> usize {
    match self {
      FitnessClass::Tight => 0,
      FitnessClass::Normal => 1,
      FitnessClass::Loose => 2,
      FitnessClass::VeryLoose => 3,
    }
  }

  /// Bucket distance to another class; a distance above 1 is an
  /// incompatible fitness change.
  pub fn distance(self, other: FitnessClass) -> usize {
    self.index().abs_diff(other.index())
  }

  pub(crate) const ALL: [FitnessClass; 4] = [
    FitnessClass::Tight,
    FitnessClass::Normal,
    FitnessClass::Loose,
    FitnessClass::VeryLoose,
  ];
}

/// The adjustment ratio needed to make up `difference` millipoints with the
/// given amounts of stretch and shrink.
///
/// Positive differences stretch (underfull), negative ones shrink
/// (overfull). When the needed elasticity is absent the ratio saturates at
/// `±INFINITE_RATIO` rather than dividing by zero; such candidates are
/// infeasible but still comparable for emergency handling.
pub fn adjustment_ratio(difference: i32, available_stretch: i32, available_shrink: i32) -> f64 {
  if difference > 0 {
    if available_stretch > 0 {
      f64::from(difference) / f64::from(available_stretch)
    } else {
      INFINITE_RATIO
    }
  } else if difference < 0 {
    if available_shrink > 0 {
      f64::from(difference) / f64::from(available_shrink)
    } else {
      -INFINITE_RATIO
    }
  } else {
    0.0
  }
}

/// Walks the element list once and returns every legal break candidate in
/// order, including a synthetic forced candidate at `list.len()` when the
/// list does not already end in a forced penalty.
pub fn scan(list: &ElementList, config: &BreakConfig) -> Vec<ScannedCandidate> {
  let mut sums = RunningSums::default();
  let mut previous_is_box = false;
  let mut candidates = Vec::new();

  for (i, el) in list.iter().enumerate() {
    match *el {
      Element::Box { width, .. } => {
        sums.width += width;
        previous_is_box = true;
      }
      Element::Glue { width, stretch, shrink } => {
        if previous_is_box {
          candidates.push(ScannedCandidate {
            index: i,
            before: sums,
            after: sums_after_break(list, i, sums),
            penalty_width: 0,
            penalty_value: 0,
            flagged: false,
            forced: false,
          });
        }
        sums.add_glue(width, stretch, shrink);
        previous_is_box = false;
      }
      Element::Penalty { width, value, flagged } => {
        let forced = value <= -INFINITE_PENALTY;
        // forced breaks are always legal, even when flagged breaks are off
        if forced || (value < INFINITE_PENALTY && (config.hyphenation_allowed || !flagged)) {
          candidates.push(ScannedCandidate {
            index: i,
            before: sums,
            after: sums_after_break(list, i, sums),
            penalty_width: width,
            penalty_value: value,
            flagged,
            forced,
          });
        }
        previous_is_box = false;
      }
    }
  }

  let ends_forced = list.last().is_some_and(Element::is_forced_break);
  if !ends_forced {
    candidates.push(ScannedCandidate {
      index: list.len(),
      before: sums,
      after: sums,
      penalty_width: 0,
      penalty_value: -INFINITE_PENALTY,
      flagged: false,
      forced: true,
    });
  }

  log::trace!(
    "scanned {} elements, {} break candidates",
    list.len(),
    candidates.len()
  );
  candidates
}

/// Advances the running sums past the discardable glue/penalty run that
/// follows a break at `index`. A segment starting after the break resumes
/// from these totals, so inter-segment glue is never counted in any line.
fn sums_after_break(list: &ElementList, index: usize, mut sums: RunningSums) -> RunningSums {
  for j in index..list.len() {
    match list[j] {
      Element::Box { .. } => break,
      Element::Glue { width, stretch, shrink } => sums.add_glue(width, stretch, shrink),
      Element::Penalty { value, .. } => {
        if j != index && value <= -INFINITE_PENALTY {
          break;
        }
      }
    }
  }
  sums
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::element::Position;

  fn boxed(width: i32) -> Element {
    Element::new_box(width, Position::default())
  }

  fn scan_default(elements: Vec<Element>) -> Vec<ScannedCandidate> {
    scan(&ElementList::new(elements), &BreakConfig::new(0))
  }

  #[test]
  fn fitness_buckets_are_deterministic_on_boundaries() {
    assert_eq!(FitnessClass::from_ratio(-0.6), FitnessClass::Tight);
    assert_eq!(FitnessClass::from_ratio(-0.5), FitnessClass::Normal);
    assert_eq!(FitnessClass::from_ratio(0.0), FitnessClass::Normal);
    assert_eq!(FitnessClass::from_ratio(0.5), FitnessClass::Normal);
    assert_eq!(FitnessClass::from_ratio(0.75), FitnessClass::Loose);
    assert_eq!(FitnessClass::from_ratio(1.0), FitnessClass::Loose);
    assert_eq!(FitnessClass::from_ratio(1.01), FitnessClass::VeryLoose);
  }

  #[test]
  fn ratio_saturates_without_elasticity() {
    assert_eq!(adjustment_ratio(100, 0, 0), INFINITE_RATIO);
    assert_eq!(adjustment_ratio(-100, 0, 0), -INFINITE_RATIO);
    assert_eq!(adjustment_ratio(0, 0, 0), 0.0);
    assert_eq!(adjustment_ratio(50, 100, 0), 0.5);
    assert_eq!(adjustment_ratio(-50, 0, 100), -0.5);
  }

  #[test]
  fn scan_finds_glue_and_penalty_candidates() {
    let candidates = scan_default(vec![
      boxed(100),
      Element::new_glue(20, 10, 5),
      boxed(100),
      Element::new_penalty(0, 0, false),
      boxed(100),
    ]);
    let indices: Vec<usize> = candidates.iter().map(|c| c.index).collect();
    // glue at 1, penalty at 3, synthetic end at 5
    assert_eq!(indices, vec![1, 3, 5]);
    assert!(candidates[2].forced);
  }

  #[test]
  fn glue_candidate_excludes_its_own_width() {
    let candidates = scan_default(vec![boxed(100), Element::new_glue(20, 10, 5), boxed(30)]);
    assert_eq!(candidates[0].before.width, 100);
    // the glue is discarded across the break but carried in the totals
    assert_eq!(candidates[0].after.width, 120);
    assert_eq!(candidates[0].after.stretch, 10);
  }

  #[test]
  fn infinite_penalty_is_never_scanned() {
    let candidates = scan_default(vec![
      boxed(100),
      Element::new_penalty(0, INFINITE_PENALTY, false),
      boxed(100),
    ]);
    assert!(candidates.iter().all(|c| c.index != 1));
  }

  #[test]
  fn flagged_penalties_are_skipped_when_hyphenation_disallowed() {
    let list = ElementList::new(vec![
      boxed(100),
      Element::new_penalty(20, 50, true),
      boxed(100),
    ]);
    let mut config = BreakConfig::new(0);
    config.hyphenation_allowed = false;
    let candidates = scan(&list, &config);
    assert!(candidates.iter().all(|c| c.index != 1));
  }

  #[test]
  fn trailing_forced_penalty_suppresses_synthetic_end() {
    let candidates = scan_default(vec![boxed(100), Element::forced_break()]);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].index, 1);
    assert!(candidates[0].forced);
  }
}
