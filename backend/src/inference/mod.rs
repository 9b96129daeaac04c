pub mod model;
pub mod preprocess;

use shared::TumorClass;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),
    #[error("Model error: {0}")]
    ModelError(#[from] tch::TchError),
    #[error("Model returned no scores")]
    EmptyOutput,
    #[error("Class index {0} is outside the label table")]
    UnknownClass(usize),
}

/// Anything that can turn raw image bytes into one of the fixed tumor classes.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, image: &[u8]) -> Result<TumorClass, InferenceError>;
}

/// Index of the highest score, first one on ties, mapped through the label table.
pub fn argmax_class(scores: &[f32]) -> Result<TumorClass, InferenceError> {
    let (index, _) = scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((i, score)),
        })
        .ok_or(InferenceError::EmptyOutput)?;
    TumorClass::from_repr(index).ok_or(InferenceError::UnknownClass(index))
}
