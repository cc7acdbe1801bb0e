use crate::evolution::{GenerationId, MelodyId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvolveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("generation {0} is not in the store")]
    UnknownGeneration(GenerationId),
    #[error("melody {id} is not part of generation {generation}")]
    UnknownMelody {
        generation: GenerationId,
        id: MelodyId,
    },
}

pub type EvolveResult<T> = Result<T, EvolveError>;

pub fn invalid<T, S: Into<String>>(msg: S) -> EvolveResult<T> {
    Err(EvolveError::InvalidInput(msg.into()))
}

/// Probabilities and sweet spots share the same domain.
pub fn check_unit_interval(value: f64, what: &str) -> EvolveResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        invalid(format!("{what} must lie within [0, 1], got {value}"))
    }
}
