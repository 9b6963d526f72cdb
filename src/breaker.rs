//! Demerits and path selection
//!
//! A single forward pass over the scanned break candidates maintains a set
//! of active nodes, each describing one feasible partial solution ending at
//! a candidate. For every new candidate, a transition is evaluated from
//! every active node; per fitness class only the cheapest transition
//! survives, and dominated nodes in the same (line, fitness) bucket are
//! pruned immediately, so the live set stays proportional to the line
//! count. Nodes live in an arena and refer to their predecessors by index;
//! the chosen path is recovered by walking those indices back from the
//! cheapest terminal node.

use std::collections::BTreeMap;

use crate::config::BreakConfig;
use crate::element::ElementList;
use crate::error::{Error, Result};
use crate::scanner::{
  adjustment_ratio, scan, FitnessClass, RunningSums, ScannedCandidate, INFINITE_RATIO,
};

/// Badness is capped here once a ratio saturates, keeping forced and
/// emergency breaks comparable without letting them swamp the arithmetic.
const MAX_BADNESS: f64 = 10_000.0;

/// Repair and restart passes give up after this many attempts.
pub(crate) const MAX_REPAIR_PASSES: usize = 8;

/// One accepted break in the output sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakPosition {
  /// Index of the break element; `list.len()` denotes the end-of-list
  /// break of a list that does not end in a forced penalty.
  pub element_index: usize,
  /// Ratio by which the glue of the finished segment must stretch
  /// (positive) or shrink (negative) to fill the available size.
  pub adjustment_ratio: f64,
  pub fitness: FitnessClass,
  /// Cumulative demerits along the chosen path up to this break.
  pub demerits: f64,
  /// Target size minus actual content size, in millipoints.
  pub difference: i32,
  /// True for forced penalties and the end-of-list break.
  pub is_forced: bool,
  /// True when the segment ending here overflows its available size and
  /// was only accepted through emergency recovery.
  pub is_overfull: bool,
}

#[derive(Debug, Clone)]
struct ActiveNode {
  position: usize,
  line: usize,
  fitness: FitnessClass,
  /// Running totals a segment starting after this break resumes from.
  sums: RunningSums,
  ratio: f64,
  difference: i32,
  total_demerits: f64,
  flagged: bool,
  forced: bool,
  overfull: bool,
  previous: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct BestRecord {
  demerits: f64,
  node: usize,
  ratio: f64,
  difference: i32,
}

/// Best transition per fitness class into the candidate currently under
/// consideration. Reset after each (candidate, line) sweep.
#[derive(Debug, Default)]
struct BestRecords {
  slots: [Option<BestRecord>; 4],
}

impl BestRecords {
  fn add(&mut self, fitness: FitnessClass, record: BestRecord) {
    let slot = &mut self.slots[fitness.index()];
    // strict comparison: ties keep the earlier-registered transition
    if slot.map_or(true, |r| record.demerits < r.demerits) {
      *slot = Some(record);
    }
  }

  fn get(&self, fitness: FitnessClass) -> Option<BestRecord> {
    self.slots[fitness.index()]
  }

  fn has_records(&self) -> bool {
    self.slots.iter().any(Option::is_some)
  }

  fn min_demerits(&self) -> f64 {
    self
      .slots
      .iter()
      .flatten()
      .map(|r| r.demerits)
      .fold(f64::INFINITY, f64::min)
  }
}

/// Finds the demerit-minimal ordered set of break positions for the list
/// under the given configuration.
///
/// The search is a pure function of its inputs: re-running it on an
/// unchanged list and configuration produces bit-identical output. When no
/// feasible candidate exists between two forced breaks and `config.force`
/// is set (the default), an overfull break is emitted at the point of
/// maximum feasible content instead of failing.
pub fn find_break_positions(
  list: &ElementList,
  config: &BreakConfig,
) -> Result<Vec<BreakPosition>> {
  list.validate()?;
  let candidates = scan(list, config);
  Search::new(config, &candidates).run()
}

struct Search<'a> {
  config: &'a BreakConfig,
  candidates: &'a [ScannedCandidate],
  arena: Vec<ActiveNode>,
  /// Active node ids bucketed by line number, in insertion order.
  active: BTreeMap<usize, Vec<usize>>,
  active_count: usize,
  /// Cheapest slightly-too-loose transition seen while forcing.
  last_too_short: Option<ActiveNode>,
  /// Cheapest overfull transition seen while forcing.
  last_too_long: Option<ActiveNode>,
  last_restart_position: usize,
}

impl<'a> Search<'a> {
  fn new(config: &'a BreakConfig, candidates: &'a [ScannedCandidate]) -> Self {
    Self {
      config,
      candidates,
      arena: Vec::new(),
      active: BTreeMap::new(),
      active_count: 0,
      last_too_short: None,
      last_too_long: None,
      last_restart_position: 0,
    }
  }

  fn run(mut self) -> Result<Vec<BreakPosition>> {
    let root = ActiveNode {
      position: 0,
      line: 0,
      fitness: FitnessClass::Normal,
      sums: RunningSums::default(),
      ratio: 0.0,
      difference: 0,
      total_demerits: 0.0,
      flagged: false,
      forced: false,
      overfull: false,
      previous: None,
    };
    let root_id = self.push(root);
    self.activate(root_id);

    let mut ci = 0;
    while ci < self.candidates.len() {
      let candidate = self.candidates[ci];
      self.consider_candidate(&candidate);

      if self.active_count == 0 {
        if !self.config.force {
          return Err(Error::NoFeasibleBreaks);
        }
        let position = self.restart()?;
        // resume scanning just past the restart point
        ci = self.candidates.partition_point(|c| c.index <= position);
        continue;
      }
      ci += 1;
    }

    self.recover_path()
  }

  /// Evaluates transitions from every active node into `candidate`,
  /// line by line, then materializes the surviving best records as new
  /// active nodes one line further on.
  fn consider_candidate(&mut self, candidate: &ScannedCandidate) {
    let lines: Vec<usize> = self.active.keys().copied().collect();
    for line in lines {
      let Some(ids) = self.active.get(&line) else { continue };
      let ids = ids.clone();
      let target = self.config.line_widths.get(line);
      let mut best = BestRecords::default();
      let mut removals = Vec::new();

      for id in ids {
        let node = &self.arena[id];
        if node.position == candidate.index {
          continue;
        }

        let actual = candidate.before.width - node.sums.width + candidate.penalty_width;
        let difference = target - actual;
        let available_stretch = candidate.before.stretch - node.sums.stretch;
        let available_shrink = candidate.before.shrink - node.sums.shrink;
        let r = adjustment_ratio(difference, available_stretch, available_shrink);
        log::trace!(
          "candidate {} from node at {} (line {line}): r={r:.3} diff={difference}",
          candidate.index,
          node.position
        );

        // A segment that would need more than the available shrink can
        // never become feasible again; forced breaks terminate every
        // surviving node.
        if r < -1.0 || candidate.forced {
          removals.push(id);
        }

        // Forced breaks accept any looseness (the last line of a unit is
        // naturally underfull); everything else must fall in the window.
        let feasible = r >= -1.0 && (r <= self.config.threshold || candidate.forced);
        if feasible {
          let r = r.clamp(-INFINITE_RATIO, INFINITE_RATIO);
          let fitness = FitnessClass::from_ratio(r);
          let demerits = self.transition_demerits(node, candidate, fitness, r);
          best.add(fitness, BestRecord { demerits, node: id, ratio: r, difference });
          self.last_too_short = None;
        } else if self.config.force {
          self.record_emergency(id, candidate, line, r, difference);
        }
      }

      self.materialize_breaks(line, candidate, &best);
      for id in removals {
        self.deactivate(line, id);
      }
    }
  }

  /// Remembers the least-bad infeasible transition on each side of the
  /// window so the search can restart from it if the active set empties.
  fn record_emergency(
    &mut self,
    from: usize,
    candidate: &ScannedCandidate,
    line: usize,
    r: f64,
    difference: i32,
  ) {
    let clamped = r.clamp(-INFINITE_RATIO, INFINITE_RATIO);
    let fitness = FitnessClass::from_ratio(clamped);
    let demerits = self.transition_demerits(&self.arena[from], candidate, fitness, clamped);
    let node = ActiveNode {
      position: candidate.index,
      line: line + 1,
      fitness,
      sums: candidate.after,
      ratio: clamped,
      difference,
      total_demerits: demerits,
      flagged: candidate.flagged,
      forced: candidate.forced,
      overfull: r < -1.0,
      previous: Some(from),
    };
    if r < -1.0 {
      if self.last_too_long.as_ref().map_or(true, |n| demerits < n.total_demerits) {
        self.last_too_long = Some(node);
      }
    } else if self.last_too_short.as_ref().map_or(true, |n| demerits <= n.total_demerits) {
      self.last_too_short = Some(node);
    }
  }

  /// Creates active nodes for the best records within the acceptance
  /// window of the minimum, pruning dominated nodes in the target buckets.
  fn materialize_breaks(&mut self, line: usize, candidate: &ScannedCandidate, best: &BestRecords) {
    if !best.has_records() {
      return;
    }
    let cutoff = best.min_demerits() + self.config.incompatible_fitness_demerit;
    for fitness in FitnessClass::ALL {
      let Some(record) = best.get(fitness) else { continue };
      if record.demerits > cutoff {
        continue;
      }
      let node = ActiveNode {
        position: candidate.index,
        line: line + 1,
        fitness,
        sums: candidate.after,
        ratio: record.ratio,
        difference: record.difference,
        total_demerits: record.demerits,
        flagged: candidate.flagged,
        forced: candidate.forced,
        overfull: false,
        previous: Some(record.node),
      };
      self.insert_pruned(node);
    }
  }

  /// Inserts a node unless an equal-or-better node already occupies its
  /// (line, fitness) bucket; dominated occupants are dropped. Ties keep
  /// the earlier-registered node, which makes the search deterministic.
  fn insert_pruned(&mut self, node: ActiveNode) {
    let mut dominated = Vec::new();
    if let Some(bucket) = self.active.get(&node.line) {
      for &id in bucket {
        let existing = &self.arena[id];
        if existing.fitness != node.fitness {
          continue;
        }
        if existing.total_demerits <= node.total_demerits {
          return;
        }
        dominated.push(id);
      }
    }
    let line = node.line;
    if !dominated.is_empty() {
      if let Some(bucket) = self.active.get_mut(&line) {
        bucket.retain(|id| !dominated.contains(id));
      }
      self.active_count -= dominated.len();
    }
    let id = self.push(node);
    self.active.entry(line).or_default().push(id);
    self.active_count += 1;
  }

  fn transition_demerits(
    &self,
    node: &ActiveNode,
    candidate: &ScannedCandidate,
    fitness: FitnessClass,
    r: f64,
  ) -> f64 {
    let badness = (100.0 * r.abs().powi(3)).min(MAX_BADNESS);
    let f = 1.0 + badness;
    let p = candidate.penalty_value;
    let mut demerits = if candidate.forced {
      f * f
    } else if p >= 0 {
      let fp = f + f64::from(p);
      fp * fp
    } else {
      // negative penalty: a bonus for encouraged breaks
      f * f - f64::from(p) * f64::from(p)
    };
    if candidate.flagged && node.flagged {
      demerits += self.config.repeated_flagged_demerit;
    }
    if fitness.distance(node.fitness) > 1 {
      demerits += self.config.incompatible_fitness_demerit;
    }
    demerits + node.total_demerits
  }

  /// Reactivates the least-bad emergency node after the active set has
  /// emptied, resetting its demerits so the remainder of the list is
  /// judged on its own. Returns the restart position.
  fn restart(&mut self) -> Result<usize> {
    let pick_long = match &self.last_too_short {
      None => true,
      Some(n) => n.position == self.last_restart_position,
    };
    let node = if pick_long {
      self.last_too_long.take().or_else(|| self.last_too_short.take())
    } else {
      self.last_too_short.take().or_else(|| self.last_too_long.take())
    };
    let Some(mut node) = node else {
      return Err(Error::NoFeasibleBreaks);
    };
    if node.overfull {
      log::warn!(
        "content cannot fit: emitting overfull break at element {}",
        node.position
      );
    } else {
      log::debug!("restarting break search at element {}", node.position);
    }
    node.total_demerits = 0.0;
    let position = node.position;
    self.last_restart_position = position;
    self.last_too_short = None;
    self.last_too_long = None;
    let id = self.push(node);
    self.activate(id);
    Ok(position)
  }

  fn recover_path(&self) -> Result<Vec<BreakPosition>> {
    let last_index = match self.candidates.last() {
      Some(c) => c.index,
      None => return Err(Error::NoFeasibleBreaks),
    };

    let mut terminal: Option<usize> = None;
    for ids in self.active.values() {
      for &id in ids {
        let node = &self.arena[id];
        if node.position != last_index {
          continue;
        }
        // strict comparison keeps the first-seen node on ties
        if terminal.map_or(true, |t| node.total_demerits < self.arena[t].total_demerits) {
          terminal = Some(id);
        }
      }
    }
    let Some(terminal) = terminal else {
      return Err(Error::NoFeasibleBreaks);
    };

    let mut positions = Vec::new();
    let mut cursor = Some(terminal);
    while let Some(id) = cursor {
      let node = &self.arena[id];
      if node.previous.is_none() {
        break; // the root start node is not a break
      }
      positions.push(BreakPosition {
        element_index: node.position,
        adjustment_ratio: node.ratio,
        fitness: node.fitness,
        demerits: node.total_demerits,
        difference: node.difference,
        is_forced: node.forced,
        is_overfull: node.overfull,
      });
      cursor = node.previous;
    }
    positions.reverse();
    log::debug!(
      "chose {} break positions, total demerits {:.1}",
      positions.len(),
      positions.last().map_or(0.0, |p| p.demerits)
    );
    Ok(positions)
  }

  fn push(&mut self, node: ActiveNode) -> usize {
    self.arena.push(node);
    self.arena.len() - 1
  }

  fn activate(&mut self, id: usize) {
    let line = self.arena[id].line;
    self.active.entry(line).or_default().push(id);
    self.active_count += 1;
  }

  fn deactivate(&mut self, line: usize, id: usize) {
    if let Some(bucket) = self.active.get_mut(&line) {
      let before = bucket.len();
      bucket.retain(|&n| n != id);
      if bucket.len() < before {
        self.active_count -= 1;
      }
      if bucket.is_empty() {
        self.active.remove(&line);
      }
    }
  }
}
