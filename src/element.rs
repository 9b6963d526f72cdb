//! The element (atom) model consumed by the breaking engine
//!
//! A layout unit (a paragraph, a table row group, a page flow) is described
//! as an ordered list of three kinds of elements:
//!
//! - **Box**: fixed, non-breakable content with a width
//! - **Glue**: breakable space with natural width, stretch, and shrink
//! - **Penalty**: a potential break with a cost; `-INFINITE_PENALTY` forces
//!   a break, `+INFINITE_PENALTY` forbids one
//!
//! All widths are integer millipoints (thousandths of a point). The engine
//! treats an element list as read-only input; upstream layout managers own
//! its construction.

use crate::error::{Error, Result};

/// Penalty sentinel. Values at or above this forbid a break; values at or
/// below its negation force one. Penalty arithmetic saturates at the
/// sentinels so comparisons never overflow.
pub const INFINITE_PENALTY: i32 = 1000;

/// Back-reference from a box to the content it renders.
///
/// `source` identifies the originating layout manager (or, in combined
/// row-group lists, the originating cell); `start..end` is the content
/// sub-range the box represents. The engine never interprets these values;
/// it only carries them so that the material between two accepted breaks
/// can be re-attributed after the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
  pub source: usize,
  pub start: usize,
  pub end: usize,
}

impl Position {
  pub fn new(source: usize, start: usize, end: usize) -> Self {
    Self { source, start, end }
  }
}

/// One element of a layout unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
  /// Fixed content span. Never a break point.
  Box { width: i32, position: Position },
  /// Breakable space. A legal break point only when immediately preceded
  /// by a box.
  Glue { width: i32, stretch: i32, shrink: i32 },
  /// Potential break with a cost. `width` is only charged when the break
  /// is taken (a visible hyphen). `flagged` marks hyphenation-style breaks
  /// so consecutive flagged breaks can be penalized.
  Penalty { width: i32, value: i32, flagged: bool },
}

impl Element {
  pub fn new_box(width: i32, position: Position) -> Self {
    Element::Box { width, position }
  }

  pub fn new_glue(width: i32, stretch: i32, shrink: i32) -> Self {
    Element::Glue { width, stretch, shrink }
  }

  pub fn new_penalty(width: i32, value: i32, flagged: bool) -> Self {
    Element::Penalty {
      width,
      value: value.clamp(-INFINITE_PENALTY, INFINITE_PENALTY),
      flagged,
    }
  }

  /// A zero-width penalty that forces a break.
  pub fn forced_break() -> Self {
    Element::Penalty {
      width: 0,
      value: -INFINITE_PENALTY,
      flagged: false,
    }
  }

  pub fn is_box(&self) -> bool {
    matches!(self, Element::Box { .. })
  }

  pub fn is_glue(&self) -> bool {
    matches!(self, Element::Glue { .. })
  }

  pub fn is_penalty(&self) -> bool {
    matches!(self, Element::Penalty { .. })
  }

  /// Width contributed to a line whether or not a break occurs here.
  /// Penalty widths are excluded; they only apply when the break is taken.
  pub fn natural_width(&self) -> i32 {
    match *self {
      Element::Box { width, .. } => width,
      Element::Glue { width, .. } => width,
      Element::Penalty { .. } => 0,
    }
  }

  pub fn penalty_value(&self) -> i32 {
    match *self {
      Element::Penalty { value, .. } => value,
      _ => 0,
    }
  }

  pub fn is_flagged(&self) -> bool {
    matches!(*self, Element::Penalty { flagged: true, .. })
  }

  pub fn is_forced_break(&self) -> bool {
    matches!(*self, Element::Penalty { value, .. } if value <= -INFINITE_PENALTY)
  }
}

/// The full ordered list of elements for one layout unit.
///
/// Built once by the caller and consumed read-only by the engine. The
/// wrapper exists to centralize the structural preconditions and the break
/// legality rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementList {
  elements: Vec<Element>,
}

impl ElementList {
  pub fn new(elements: Vec<Element>) -> Self {
    Self { elements }
  }

  pub fn elements(&self) -> &[Element] {
    &self.elements
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Element> {
    self.elements.get(index)
  }

  pub fn last(&self) -> Option<&Element> {
    self.elements.last()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Element> {
    self.elements.iter()
  }

  /// Returns true if a break may legally occur at `index`: a penalty whose
  /// value is below `INFINITE_PENALTY`, or glue immediately preceded by a
  /// box. Boxes and start-of-list glue are never legal breaks.
  pub fn is_legal_break(&self, index: usize) -> bool {
    match self.elements.get(index) {
      Some(Element::Penalty { value, .. }) => *value < INFINITE_PENALTY,
      Some(Element::Glue { .. }) => {
        index > 0 && self.elements[index - 1].is_box()
      }
      _ => false,
    }
  }

  /// Checks the structural preconditions on the sequence. Violations are
  /// caller programming errors, fatal to the break call.
  pub fn validate(&self) -> Result<()> {
    if self.elements.is_empty() {
      return Err(Error::MalformedSequence("empty element list".to_string()));
    }
    if self.elements[0].is_glue() {
      return Err(Error::MalformedSequence(
        "glue at start of list".to_string(),
      ));
    }
    for (i, el) in self.elements.iter().enumerate() {
      match *el {
        Element::Box { width, .. } if width < 0 => {
          return Err(Error::MalformedSequence(format!(
            "negative box width at element {i}"
          )));
        }
        Element::Glue { width, stretch, shrink }
          if width < 0 || stretch < 0 || shrink < 0 =>
        {
          return Err(Error::MalformedSequence(format!(
            "negative glue dimension at element {i}"
          )));
        }
        Element::Penalty { width, .. } if width < 0 => {
          return Err(Error::MalformedSequence(format!(
            "negative penalty width at element {i}"
          )));
        }
        _ => {}
      }
    }
    Ok(())
  }
}

impl From<Vec<Element>> for ElementList {
  fn from(elements: Vec<Element>) -> Self {
    Self::new(elements)
  }
}

impl std::ops::Index<usize> for ElementList {
  type Output = Element;

  fn index(&self, index: usize) -> &Element {
    &self.elements[index]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boxed(width: i32) -> Element {
    Element::new_box(width, Position::default())
  }

  #[test]
  fn glue_after_box_is_legal_break() {
    let list = ElementList::new(vec![boxed(100), Element::new_glue(20, 10, 5)]);
    assert!(list.is_legal_break(1));
  }

  #[test]
  fn glue_after_glue_is_not_a_break() {
    let list = ElementList::new(vec![
      boxed(100),
      Element::new_glue(20, 10, 5),
      Element::new_glue(20, 10, 5),
    ]);
    assert!(list.is_legal_break(1));
    assert!(!list.is_legal_break(2), "consecutive glue collapses to one break point");
  }

  #[test]
  fn infinite_penalty_is_not_a_break() {
    let list = ElementList::new(vec![
      boxed(100),
      Element::new_penalty(0, INFINITE_PENALTY, false),
      Element::new_penalty(0, 0, false),
    ]);
    assert!(!list.is_legal_break(1));
    assert!(list.is_legal_break(2));
  }

  #[test]
  fn penalty_values_clamp_to_sentinels() {
    let p = Element::new_penalty(0, i32::MIN, false);
    assert!(p.is_forced_break());
    let p = Element::new_penalty(0, i32::MAX, false);
    assert_eq!(p.penalty_value(), INFINITE_PENALTY);
  }

  #[test]
  fn validate_rejects_leading_glue() {
    let list = ElementList::new(vec![Element::new_glue(20, 10, 5), boxed(100)]);
    assert!(matches!(list.validate(), Err(Error::MalformedSequence(_))));
  }

  #[test]
  fn validate_rejects_negative_widths() {
    let list = ElementList::new(vec![boxed(-1)]);
    assert!(matches!(list.validate(), Err(Error::MalformedSequence(_))));
    let list = ElementList::new(vec![boxed(10), Element::new_glue(5, -2, 0)]);
    assert!(matches!(list.validate(), Err(Error::MalformedSequence(_))));
  }

  #[test]
  fn validate_rejects_empty_list() {
    assert!(matches!(
      ElementList::default().validate(),
      Err(Error::MalformedSequence(_))
    ));
  }
}
