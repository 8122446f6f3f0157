use std::fmt;

/// Errors that can occur when building a `ValueQueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The per-key capacity (`num_values`) was zero.
  ZeroValues,
  /// The low watermark was outside the half-open range `(0, 1]`.
  InvalidWatermark,
  /// The filler pool was configured with zero threads.
  ZeroFillerThreads,
  /// No `QueueRefiller` was provided. The queue never generates values
  /// itself, so a refiller is mandatory.
  RefillerRequired,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroValues => write!(f, "per-key capacity cannot be zero"),
      BuildError::InvalidWatermark => {
        write!(f, "low watermark must be greater than 0 and at most 1")
      }
      BuildError::ZeroFillerThreads => write!(f, "filler thread count cannot be zero"),
      BuildError::RefillerRequired => write!(f, "a queue refiller is required"),
    }
  }
}

impl std::error::Error for BuildError {}

/// A failure reported by the external refiller while generating values.
///
/// The error is cloneable so it can be handed to every caller that was
/// blocked on the same refill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
  message: String,
}

impl GenerationError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl fmt::Display for GenerationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "value generation failed: {}", self.message)
  }
}

impl std::error::Error for GenerationError {}

/// Errors surfaced by `get_next` / `get_at_most`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
  /// No values were available and the configured policy forbids blocking.
  Empty,
  /// The refill this caller was blocked on failed.
  Generation(GenerationError),
  /// The blocking wait exceeded the configured `refill_timeout`.
  Timeout,
  /// The queue has been shut down.
  ShutDown,
}

impl fmt::Display for QueueError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueueError::Empty => write!(f, "no values available"),
      QueueError::Generation(err) => write!(f, "{}", err),
      QueueError::Timeout => write!(f, "timed out waiting for a refill"),
      QueueError::ShutDown => write!(f, "value queue has been shut down"),
    }
  }
}

impl std::error::Error for QueueError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      QueueError::Generation(err) => Some(err),
      _ => None,
    }
  }
}

impl From<GenerationError> for QueueError {
  fn from(err: GenerationError) -> Self {
    QueueError::Generation(err)
  }
}
