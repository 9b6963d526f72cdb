//! Structural constraints over the raw candidate set
//!
//! Keeps, forced breaks, and widow/orphan minimums are expressed on source
//! content; this layer translates them into element-list surgery before the
//! search runs, plus a repair pass afterwards for the rare widow/orphan
//! interactions. It also aggregates the per-cell element lists of a table
//! row group into one combined list that keeps the cells' own elements,
//! split at row boundaries, and remembers which cell content each row
//! stands for.

use std::collections::BTreeSet;

use crate::breaker::{find_break_positions, BreakPosition, MAX_REPAIR_PASSES};
use crate::config::BreakConfig;
use crate::element::{Element, ElementList, Position, INFINITE_PENALTY};
use crate::error::{Error, Result};

/// A structural constraint on break placement, in original element indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
  /// No break anywhere strictly inside the inclusive element range
  /// `start..=end`.
  Together { start: usize, end: usize },
  /// No break between element `index` and the following box.
  WithNext { index: usize },
  /// No break between element `index` and the preceding box.
  WithPrevious { index: usize },
  /// Force a break immediately after element `index`.
  BreakAfter { index: usize },
  /// No break at exactly element `index`. Used by the repair pass.
  Forbid { index: usize },
}

/// Applies keeps to an element sequence, returning the transformed list and
/// a map from new indices back to originals.
///
/// Forbidden penalties have their value raised to `+INFINITE_PENALTY`;
/// forbidden glue breaks gain a synthetic infinite penalty in front of the
/// glue so the scanner never proposes them. Forced penalties always win
/// over keeps: a keep-together spanning more content than fits degrades to
/// an overfull break downstream rather than dropping content.
pub fn apply_keeps(elements: &[Element], keeps: &[Keep]) -> (ElementList, Vec<usize>) {
  let mut forbidden = BTreeSet::new();
  let mut forced_after = BTreeSet::new();

  for keep in keeps {
    match *keep {
      Keep::Together { start, end } => {
        for idx in (start + 1)..=end.min(elements.len().saturating_sub(1)) {
          forbidden.insert(idx);
        }
      }
      Keep::WithNext { index } => {
        let mut idx = index + 1;
        while idx < elements.len() && !elements[idx].is_box() {
          forbidden.insert(idx);
          idx += 1;
        }
      }
      Keep::WithPrevious { index } => {
        let mut idx = index;
        while idx > 0 && !elements[idx - 1].is_box() {
          forbidden.insert(idx - 1);
          idx -= 1;
        }
        forbidden.insert(index);
      }
      Keep::BreakAfter { index } => {
        forced_after.insert(index);
      }
      Keep::Forbid { index } => {
        forbidden.insert(index);
      }
    }
  }

  let mut out = Vec::with_capacity(elements.len());
  let mut map = Vec::with_capacity(elements.len());
  let mut previous_is_box = false;

  for (i, el) in elements.iter().enumerate() {
    match *el {
      Element::Glue { .. } => {
        if forbidden.contains(&i) && previous_is_box {
          out.push(Element::new_penalty(0, INFINITE_PENALTY, false));
          map.push(i);
        }
        out.push(*el);
        map.push(i);
        previous_is_box = false;
      }
      Element::Penalty { width, value, flagged } => {
        if forbidden.contains(&i) && value > -INFINITE_PENALTY {
          out.push(Element::new_penalty(width, INFINITE_PENALTY, flagged));
        } else {
          out.push(*el);
        }
        map.push(i);
        previous_is_box = false;
      }
      Element::Box { .. } => {
        out.push(*el);
        map.push(i);
        previous_is_box = true;
      }
    }
    if forced_after.contains(&i) {
      out.push(Element::forced_break());
      map.push(i);
      previous_is_box = false;
    }
  }

  (ElementList::new(out), map)
}

/// Runs the break search and then repairs widow/orphan violations.
///
/// The minimums are enforced as a repair pass rather than a demerit term:
/// after the unconstrained optimum is found, a too-short first or last
/// segment causes the offending break to be excluded and the search re-run,
/// shifting content to the adjacent segment. If the repair cannot produce a
/// clean result within a bounded number of passes, the unconstrained result
/// is returned unchanged; content is never dropped.
pub fn break_with_page_constraints(
  list: &ElementList,
  config: &BreakConfig,
) -> Result<Vec<BreakPosition>> {
  let unconstrained = find_break_positions(list, config)?;
  if config.min_orphans <= 1 && config.min_widows <= 1 {
    return Ok(unconstrained);
  }

  let mut result = unconstrained.clone();
  let mut excluded: BTreeSet<usize> = BTreeSet::new();

  for _pass in 0..MAX_REPAIR_PASSES {
    let Some(offender) = find_violation(list, &result, config) else {
      return Ok(result);
    };
    if !excluded.insert(offender) {
      break;
    }
    log::debug!("widow/orphan repair: excluding break at element {offender}");

    let keeps: Vec<Keep> = excluded.iter().map(|&index| Keep::Forbid { index }).collect();
    let (kept_list, index_map) = apply_keeps(list.elements(), &keeps);
    match find_break_positions(&kept_list, config) {
      Ok(breaks) => result = map_back(breaks, &index_map, list.len()),
      Err(_) => break,
    }
    // an overfull repair is worse than the violation it fixes
    if result.iter().any(|b| b.is_overfull) && !unconstrained.iter().any(|b| b.is_overfull) {
      break;
    }
  }

  if find_violation(list, &result, config).is_none()
    && !result.iter().any(|b| b.is_overfull)
  {
    return Ok(result);
  }
  log::debug!("widow/orphan repair gave up; keeping unconstrained result");
  Ok(unconstrained)
}

/// Returns the original element index of the break to exclude next, or
/// `None` when the widow/orphan minimums hold.
fn find_violation(
  list: &ElementList,
  breaks: &[BreakPosition],
  config: &BreakConfig,
) -> Option<usize> {
  if breaks.len() < 2 {
    return None;
  }
  let counts = segment_box_counts(list, breaks);

  if config.min_orphans > 1 && counts.first().is_some_and(|&c| c < config.min_orphans) {
    return Some(breaks[0].element_index);
  }
  if config.min_widows > 1 && counts.last().is_some_and(|&c| c < config.min_widows) {
    // the break opening the last segment
    return Some(breaks[breaks.len() - 2].element_index);
  }
  None
}

/// Number of boxes in each segment produced by the given breaks.
fn segment_box_counts(list: &ElementList, breaks: &[BreakPosition]) -> Vec<usize> {
  let mut counts = Vec::with_capacity(breaks.len());
  let mut start = 0;
  for b in breaks {
    let end = b.element_index.min(list.len());
    let count = (start..end).filter(|&i| list[i].is_box()).count();
    counts.push(count);
    start = end;
  }
  counts
}

fn map_back(breaks: Vec<BreakPosition>, index_map: &[usize], original_len: usize) -> Vec<BreakPosition> {
  breaks
    .into_iter()
    .map(|mut b| {
      b.element_index = if b.element_index >= index_map.len() {
        original_len
      } else {
        index_map[b.element_index]
      };
      b
    })
    .collect()
}

/// One cell of a table row group, with its independently produced element
/// list.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCell {
  /// Opaque cell identifier, carried into provenance records.
  pub cell: usize,
  pub column: usize,
  pub start_row: usize,
  pub row_span: usize,
  pub elements: Vec<Element>,
}

impl GroupCell {
  fn natural_length(&self) -> i32 {
    self.elements.iter().map(Element::natural_width).sum()
  }

  fn last_row(&self) -> usize {
    self.start_row + self.row_span - 1
  }
}

/// A set of table rows considered together because of row-spanning cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
  pub rows: usize,
  pub cells: Vec<GroupCell>,
}

/// Consumed-length range of one cell attributed to one row of the combined
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlice {
  pub row: usize,
  pub cell: usize,
  pub start: i32,
  pub end: i32,
}

/// The aggregate element list for a row group, plus the provenance needed
/// to recover per-cell content ranges from combined-list break positions.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedList {
  pub elements: ElementList,
  /// Resolved height of each row: the largest per-row contribution of any
  /// cell covering it.
  pub row_heights: Vec<i32>,
  pub slices: Vec<RowSlice>,
}

/// Element queue of one cell, consumed row by row. Elements straddling a
/// row boundary are split so each row's emitted content is exactly its
/// share of the cell.
struct CellFeed {
  queue: std::collections::VecDeque<Element>,
}

impl CellFeed {
  fn take(&mut self, share: i32, out: &mut Vec<Element>) {
    let mut needed = share;
    while needed > 0 {
      let Some(el) = self.queue.pop_front() else { break };
      match el {
        Element::Box { width, position } if width > needed => {
          let span = position.end.saturating_sub(position.start) as i64;
          let cut = position.start
            + (span * i64::from(needed) / i64::from(width.max(1))) as usize;
          out.push(Element::new_box(
            needed,
            Position::new(position.source, position.start, cut),
          ));
          self.queue.push_front(Element::new_box(
            width - needed,
            Position::new(position.source, cut, position.end),
          ));
          needed = 0;
        }
        Element::Glue { width, stretch, shrink } if width > needed => {
          // elasticity splits in proportion to the width taken
          let taken_stretch = i64::from(stretch) * i64::from(needed) / i64::from(width);
          let taken_shrink = i64::from(shrink) * i64::from(needed) / i64::from(width);
          out.push(Element::new_glue(needed, taken_stretch as i32, taken_shrink as i32));
          self.queue.push_front(Element::new_glue(
            width - needed,
            stretch - taken_stretch as i32,
            shrink - taken_shrink as i32,
          ));
          needed = 0;
        }
        other => {
          needed -= other.natural_width();
          out.push(other);
        }
      }
    }
  }
}

/// Merges the per-cell element lists of a row group into a single
/// breakable list.
///
/// Each row's height is the largest per-row contribution of any cell
/// covering it (spanning cells spread their length evenly over their rows,
/// remainder on the last). The row whose height that tallest cell sets
/// contributes that cell's actual elements, split at row boundaries, so
/// glue elasticity and break points inside a row survive into the combined
/// list. Rows are separated by zero-width penalties so the breaker may
/// break between them; the `slices` table records, per row and cell, which
/// consumed-length range of the original cell the row stands for.
pub fn combine_row_group(group: &RowGroup) -> Result<CombinedList> {
  if group.rows == 0 {
    return Err(Error::MalformedRowGroup("row group with zero rows".to_string()));
  }
  for cell in &group.cells {
    if cell.row_span == 0 {
      return Err(Error::MalformedRowGroup(format!(
        "cell {} has zero row span",
        cell.cell
      )));
    }
    if cell.last_row() >= group.rows {
      return Err(Error::MalformedRowGroup(format!(
        "cell {} spans past the end of the group",
        cell.cell
      )));
    }
  }

  let mut row_heights = vec![0i32; group.rows];
  let mut governing: Vec<Option<usize>> = vec![None; group.rows];
  let mut slices = Vec::new();

  for (ci, cell) in group.cells.iter().enumerate() {
    let length = cell.natural_length();
    let span = cell.row_span as i32;
    let base = length / span;
    let mut consumed = 0;
    for (k, row) in (cell.start_row..=cell.last_row()).enumerate() {
      let share = if k as i32 == span - 1 { length - consumed } else { base };
      // ties keep the earlier cell, so the merge is deterministic
      if share > row_heights[row] {
        row_heights[row] = share;
        governing[row] = Some(ci);
      }
      slices.push(RowSlice {
        row,
        cell: cell.cell,
        start: consumed,
        end: consumed + share,
      });
      consumed += share;
    }
  }

  let mut feeds: Vec<CellFeed> = group
    .cells
    .iter()
    .map(|c| CellFeed { queue: c.elements.iter().copied().collect() })
    .collect();

  let mut elements = Vec::new();
  for row in 0..group.rows {
    match governing[row] {
      Some(ci) => feeds[ci].take(row_heights[row], &mut elements),
      // an empty row still occupies a slot in the combined list
      None => elements.push(Element::new_box(0, Position::default())),
    }
    if row + 1 < group.rows {
      elements.push(Element::new_penalty(0, 0, false));
    }
  }

  log::trace!(
    "combined row group: {} rows, {} cells, heights {:?}",
    group.rows,
    group.cells.len(),
    row_heights
  );
  Ok(CombinedList {
    elements: ElementList::new(elements),
    row_heights,
    slices,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::element::Position;

  fn boxed(width: i32) -> Element {
    Element::new_box(width, Position::default())
  }

  fn glue(width: i32, stretch: i32, shrink: i32) -> Element {
    Element::new_glue(width, stretch, shrink)
  }

  #[test]
  fn keep_together_forbids_interior_breaks() {
    let elements = vec![
      boxed(100),
      glue(20, 30, 10),
      boxed(100),
      Element::new_penalty(0, 0, false),
      boxed(100),
    ];
    let (kept, map) = apply_keeps(&elements, &[Keep::Together { start: 0, end: 4 }]);
    // the glue break gains a guarding infinite penalty, the penalty is raised
    assert_eq!(kept.len(), elements.len() + 1);
    assert!(!kept.is_legal_break(2), "glue inside a keep must not break");
    let raised = kept
      .iter()
      .filter(|e| e.penalty_value() >= INFINITE_PENALTY)
      .count();
    assert_eq!(raised, 2);
    assert_eq!(map.len(), kept.len());
  }

  #[test]
  fn forced_breaks_win_over_keeps() {
    let elements = vec![boxed(100), Element::forced_break(), boxed(100)];
    let (kept, _) = apply_keeps(&elements, &[Keep::Together { start: 0, end: 2 }]);
    assert!(kept[1].is_forced_break(), "a forced break survives keep-together");
  }

  #[test]
  fn keep_with_next_guards_the_gap_to_the_following_box() {
    let elements = vec![
      boxed(100),
      glue(20, 30, 10),
      boxed(100),
      glue(20, 30, 10),
      boxed(100),
    ];
    let (kept, map) = apply_keeps(&elements, &[Keep::WithNext { index: 0 }]);
    // the glue between element 0 and the next box gains a guard penalty
    assert_eq!(kept.len(), elements.len() + 1);
    assert!(!kept.is_legal_break(2), "no break between the kept box and its successor");
    // the later glue is untouched
    assert!(kept.is_legal_break(4));
    assert_eq!(map[4], 3);

    let breaks = find_break_positions(&kept, &BreakConfig::new(120)).unwrap();
    for b in &breaks {
      if b.element_index < map.len() {
        assert_ne!(map[b.element_index], 1, "break lands in the kept gap: {breaks:?}");
      }
    }
  }

  #[test]
  fn keep_with_previous_guards_the_gap_to_the_preceding_box() {
    let elements = vec![
      boxed(100),
      glue(20, 30, 10),
      boxed(100),
      glue(20, 30, 10),
      Element::new_penalty(0, 0, false),
      boxed(100),
    ];
    let (kept, map) = apply_keeps(&elements, &[Keep::WithPrevious { index: 5 }]);
    // both the glue and the penalty between box 2 and box 5 are guarded
    assert_eq!(kept.len(), elements.len() + 1);
    assert!(!kept.is_legal_break(4), "guarded glue must not break");
    assert!(!kept.is_legal_break(5), "guarded penalty must not break");
    // the earlier glue still breaks
    assert!(kept.is_legal_break(1));
    assert_eq!(map[1], 1);

    let breaks = find_break_positions(&kept, &BreakConfig::new(120)).unwrap();
    for b in &breaks {
      if b.element_index < map.len() {
        let original = map[b.element_index];
        assert!(
          original != 3 && original != 4,
          "break at original element {original} splits the kept pair"
        );
      }
    }
  }

  #[test]
  fn break_after_inserts_forced_penalty() {
    let elements = vec![boxed(100), glue(20, 30, 10), boxed(100)];
    let (kept, map) = apply_keeps(&elements, &[Keep::BreakAfter { index: 0 }]);
    assert!(kept[1].is_forced_break());
    assert_eq!(map[1], 0);
  }

  #[test]
  fn combine_distributes_spanning_cell_over_rows() {
    let group = RowGroup {
      rows: 2,
      cells: vec![
        GroupCell {
          cell: 0,
          column: 0,
          start_row: 0,
          row_span: 2,
          elements: vec![boxed(300)],
        },
        GroupCell {
          cell: 1,
          column: 1,
          start_row: 0,
          row_span: 1,
          elements: vec![boxed(100)],
        },
        GroupCell {
          cell: 2,
          column: 1,
          start_row: 1,
          row_span: 1,
          elements: vec![boxed(100)],
        },
      ],
    };
    let combined = combine_row_group(&group).unwrap();
    // the spanning cell needs 150 per row, more than the 100 single-row cells
    assert_eq!(combined.row_heights, vec![150, 150]);
    // its single box is split at the row boundary
    assert_eq!(combined.elements[0].natural_width(), 150);
    assert_eq!(combined.elements[2].natural_width(), 150);
    // one breakable penalty between the two rows
    assert!(combined.elements.is_legal_break(1));
    let spanning: Vec<&RowSlice> = combined.slices.iter().filter(|s| s.cell == 0).collect();
    assert_eq!(spanning.len(), 2);
    assert_eq!((spanning[0].start, spanning[0].end), (0, 150));
    assert_eq!((spanning[1].start, spanning[1].end), (150, 300));
  }

  #[test]
  fn combine_preserves_intra_row_break_points() {
    // a single row whose cell contains glue between two boxes: the glue
    // must survive the merge so the row can still break inside itself
    let group = RowGroup {
      rows: 1,
      cells: vec![GroupCell {
        cell: 0,
        column: 0,
        start_row: 0,
        row_span: 1,
        elements: vec![boxed(300), glue(10, 5, 2), boxed(300)],
      }],
    };
    let combined = combine_row_group(&group).unwrap();
    assert_eq!(combined.elements.len(), 3, "cell structure survives the merge");
    assert!(combined.elements[1].is_glue());
    assert!(combined.elements.is_legal_break(1));

    // 610 units of content against a 400-unit page break at the glue,
    // not as a single overfull row
    let breaks = find_break_positions(&combined.elements, &BreakConfig::new(400)).unwrap();
    assert!(
      breaks.iter().any(|b| b.element_index == 1),
      "the intra-row glue is a reachable break: {breaks:?}"
    );
    assert!(breaks.iter().all(|b| !b.is_overfull));
  }

  #[test]
  fn split_glue_keeps_total_elasticity() {
    // a two-row cell whose boundary falls inside its glue: the split
    // halves carry the full width, stretch, and shrink between them
    let group = RowGroup {
      rows: 2,
      cells: vec![GroupCell {
        cell: 0,
        column: 0,
        start_row: 0,
        row_span: 2,
        elements: vec![boxed(100), glue(40, 30, 12), boxed(100)],
      }],
    };
    let combined = combine_row_group(&group).unwrap();
    assert_eq!(combined.row_heights, vec![120, 120]);
    let (mut width, mut stretch, mut shrink) = (0, 0, 0);
    for el in combined.elements.iter() {
      if let Element::Glue { width: w, stretch: st, shrink: sh } = *el {
        width += w;
        stretch += st;
        shrink += sh;
      }
    }
    assert_eq!((width, stretch, shrink), (40, 30, 12));
  }

  #[test]
  fn combine_rejects_out_of_range_spans() {
    let group = RowGroup {
      rows: 1,
      cells: vec![GroupCell {
        cell: 0,
        column: 0,
        start_row: 0,
        row_span: 2,
        elements: vec![boxed(100)],
      }],
    };
    assert!(matches!(
      combine_row_group(&group),
      Err(Error::MalformedRowGroup(_))
    ));
  }
}
