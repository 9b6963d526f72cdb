//! Row/table stepping
//!
//! After the aggregate list of a row group has been broken, each grid
//! column's element list is walked in lock-step against the chosen row
//! steps to decide exactly which sub-range of elements each step consumes.
//! A cell spanning several rows is consumed once, in the step of its last
//! spanned row, so consumed lengths never overlap across steps. No demerit
//! minimization happens here; the step heights are already decided.

use crate::element::Element;
use crate::error::{Error, Result};

/// One cell as seen by the stepper: its element list plus the border
/// contributions that resolve against adjacent rows once geometry is known.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCell {
  pub cell: usize,
  pub start_row: usize,
  pub row_span: usize,
  pub elements: Vec<Element>,
  pub border_before: i32,
  pub border_after: i32,
}

impl StepCell {
  fn last_row(&self) -> usize {
    self.start_row + self.row_span - 1
  }

  fn natural_length(&self) -> i32 {
    self.elements.iter().map(Element::natural_width).sum()
  }
}

/// One grid column of a row group, cells in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCells {
  pub column: usize,
  pub cells: Vec<StepCell>,
}

/// The element sub-range of one column consumed by one row step.
///
/// Indices address the column's concatenated element sequence (cells in row
/// order); a column whose active cell continues past the step consumes
/// nothing and reports an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnStep {
  pub column: usize,
  pub start_element: usize,
  pub end_element: usize,
  pub consumed_length: i32,
}

/// One emitted row step with its per-column consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct RowStep {
  pub row: usize,
  pub height: i32,
  /// Collapsed rule width between this step and the previous one: the
  /// widest of the borders meeting at the boundary.
  pub rule_before: i32,
  pub columns: Vec<ColumnStep>,
}

/// Steps through each column's element list against the given row heights.
///
/// `row_heights` are the per-row sizes resolved by breaking the combined
/// row-group list; one `RowStep` is emitted per entry. Cell content is
/// attributed to the step of the cell's last spanned row, with the cell's
/// before/after borders folded into the consumed length.
pub fn step_columns(columns: &[ColumnCells], row_heights: &[i32]) -> Result<Vec<RowStep>> {
  let rows = row_heights.len();
  if rows == 0 {
    return Err(Error::MalformedRowGroup("no row steps to emit".to_string()));
  }
  for col in columns {
    let mut next_row = 0;
    for cell in &col.cells {
      if cell.row_span == 0 {
        return Err(Error::MalformedRowGroup(format!(
          "cell {} has zero row span",
          cell.cell
        )));
      }
      if cell.start_row < next_row || cell.last_row() >= rows {
        return Err(Error::MalformedRowGroup(format!(
          "cell {} overlaps or exceeds the row range of column {}",
          cell.cell, col.column
        )));
      }
      next_row = cell.last_row() + 1;
    }
  }

  let mut cursors = vec![0usize; columns.len()];
  let mut steps = Vec::with_capacity(rows);

  for (row, &height) in row_heights.iter().enumerate() {
    let mut column_steps = Vec::with_capacity(columns.len());
    let mut rule_before = 0;

    for (ci, col) in columns.iter().enumerate() {
      for cell in &col.cells {
        if cell.start_row == row {
          rule_before = rule_before.max(cell.border_before);
        }
        if row > 0 && cell.last_row() == row - 1 {
          rule_before = rule_before.max(cell.border_after);
        }
      }

      let mut step = ColumnStep {
        column: col.column,
        start_element: cursors[ci],
        end_element: cursors[ci],
        consumed_length: 0,
      };
      if let Some(cell) = col.cells.iter().find(|c| c.last_row() == row) {
        step.end_element = step.start_element + cell.elements.len();
        step.consumed_length = cell.natural_length() + cell.border_before + cell.border_after;
        cursors[ci] = step.end_element;
        log::trace!(
          "step {row}: column {} consumes elements {}..{} ({} units)",
          col.column,
          step.start_element,
          step.end_element,
          step.consumed_length
        );
      }
      column_steps.push(step);
    }

    steps.push(RowStep {
      row,
      height,
      rule_before: if row == 0 { 0 } else { rule_before },
      columns: column_steps,
    });
  }

  Ok(steps)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::element::Position;

  fn boxed(width: i32) -> Element {
    Element::new_box(width, Position::default())
  }

  fn cell(id: usize, start_row: usize, row_span: usize, length: i32) -> StepCell {
    StepCell {
      cell: id,
      start_row,
      row_span,
      elements: vec![boxed(length)],
      border_before: 0,
      border_after: 0,
    }
  }

  #[test]
  fn spanning_cell_consumed_at_last_row_only() {
    let columns = vec![
      ColumnCells { column: 0, cells: vec![cell(0, 0, 2, 300)] },
      ColumnCells {
        column: 1,
        cells: vec![cell(1, 0, 1, 100), cell(2, 1, 1, 100)],
      },
    ];
    let steps = step_columns(&columns, &[150, 150]).unwrap();
    assert_eq!(steps.len(), 2, "a two-row group emits exactly two steps");

    // the spanning cell contributes nothing at step 0 and everything at step 1
    assert_eq!(steps[0].columns[0].consumed_length, 0);
    assert_eq!(steps[1].columns[0].consumed_length, 300);
    assert_eq!(steps[1].columns[0].start_element, 0);
    assert_eq!(steps[1].columns[0].end_element, 1);

    // single-row cells consume exactly their own row
    assert_eq!(steps[0].columns[1].consumed_length, 100);
    assert_eq!(steps[1].columns[1].consumed_length, 100);
    assert_eq!(steps[1].columns[1].start_element, 1);

    // zero overlap: per-column consumption ranges are disjoint
    let total: i32 = steps.iter().map(|s| s.columns[0].consumed_length).sum();
    assert_eq!(total, 300);
  }

  #[test]
  fn borders_fold_into_consumed_length_and_rules() {
    let mut first = cell(0, 0, 1, 100);
    first.border_after = 8;
    let mut second = cell(1, 1, 1, 100);
    second.border_before = 5;
    let columns = vec![ColumnCells { column: 0, cells: vec![first, second] }];
    let steps = step_columns(&columns, &[100, 100]).unwrap();
    assert_eq!(steps[0].columns[0].consumed_length, 108);
    assert_eq!(steps[1].columns[0].consumed_length, 105);
    assert_eq!(steps[0].rule_before, 0);
    assert_eq!(steps[1].rule_before, 8, "the widest border at the boundary wins");
  }

  #[test]
  fn overlapping_cells_are_rejected() {
    let columns = vec![ColumnCells {
      column: 0,
      cells: vec![cell(0, 0, 2, 100), cell(1, 1, 1, 100)],
    }];
    assert!(matches!(
      step_columns(&columns, &[100, 100]),
      Err(Error::MalformedRowGroup(_))
    ));
  }

  #[test]
  fn empty_step_list_is_rejected() {
    assert!(step_columns(&[], &[]).is_err());
  }
}
