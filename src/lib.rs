//! Knuth-style optimal line and page breaking.
//!
//! This crate turns an ordered sequence of layout elements (boxes, glue,
//! penalties) into the set of break points that minimizes total demerits,
//! subject to keeps, widow/orphan minimums, and forced breaks. It is a
//! library-level computational component: upstream layout managers build
//! the element lists, downstream area producers consume the break
//! positions. The engine is a pure function of `(element list, config)`,
//! holds no global state, and may be invoked concurrently for independent
//! lists.
//!
//! # Example
//!
//! ```
//! use flowbreak::{BreakConfig, Element, ElementList, Position};
//!
//! let list = ElementList::new(vec![
//!     Element::new_box(100, Position::default()),
//!     Element::new_glue(20, 10, 5),
//!     Element::new_box(100, Position::default()),
//!     Element::new_penalty(0, 0, false),
//!     Element::new_box(100, Position::default()),
//! ]);
//! let breaks = flowbreak::find_break_positions(&list, &BreakConfig::new(220)).unwrap();
//! assert_eq!(breaks[0].element_index, 3);
//! assert_eq!(breaks[0].adjustment_ratio, 0.0);
//! ```

pub mod breaker;
pub mod config;
pub mod constraints;
pub mod element;
pub mod error;
pub mod scanner;
pub mod stepper;

pub use breaker::{find_break_positions, BreakPosition};
pub use config::{BreakConfig, LineWidths};
pub use constraints::{
  apply_keeps, break_with_page_constraints, combine_row_group, CombinedList, GroupCell, Keep,
  RowGroup, RowSlice,
};
pub use element::{Element, ElementList, Position, INFINITE_PENALTY};
pub use error::{Error, Result};
pub use scanner::{adjustment_ratio, FitnessClass, RunningSums, ScannedCandidate, INFINITE_RATIO};
pub use stepper::{step_columns, ColumnCells, ColumnStep, RowStep, StepCell};
