//! Error types for flowbreak
//!
//! Expected breaking outcomes (forced breaks, overfull lines) are ordinary
//! values, never errors. Only caller precondition violations and genuinely
//! unbreakable searches surface through this type.

use thiserror::Error;

/// Result type alias for flowbreak operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for flowbreak
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  /// The element sequence violates a structural precondition: empty list,
  /// glue at the start of the list, or a negative width/stretch/shrink.
  /// This is a caller programming error, not a recoverable layout state.
  #[error("malformed element sequence: {0}")]
  MalformedSequence(String),

  /// No feasible set of break points exists and forcing was disabled.
  /// With `BreakConfig::force` (the default) this is never returned; the
  /// search emits overfull breaks instead.
  #[error("no feasible break points found")]
  NoFeasibleBreaks,

  /// A row group or column description is internally inconsistent, for
  /// example a cell spanning past the end of the group.
  #[error("malformed row group: {0}")]
  MalformedRowGroup(String),
}
