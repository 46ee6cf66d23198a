// Classifier - contract between the analysis worker and a key estimator
//
// The worker only needs one operation: mono samples in, key (or silence) out.
// Keeping it behind a trait lets tests drive the pipeline with deterministic
// stubs and keeps the spectral algorithm swappable.

use super::key::Key;

/// Result of classifying one analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Classification {
    /// A definite key estimate
    Key(Key),
    /// Window was silent or had no tonal content
    Silence,
}

impl Classification {
    pub fn key(self) -> Option<Key> {
        match self {
            Classification::Key(key) => Some(key),
            Classification::Silence => None,
        }
    }
}

impl From<Key> for Classification {
    fn from(key: Key) -> Self {
        Classification::Key(key)
    }
}

/// Key estimator invoked on the analysis thread
///
/// Implementations may be CPU-heavy and may keep internal scratch state
/// (hence `&mut self`), but must not assume anything about call cadence:
/// windows can be skipped arbitrarily under load.
pub trait KeyClassifier: Send {
    /// Classify a window of mono samples
    ///
    /// # Arguments
    /// * `samples` - Mono samples in [-1, 1] at the decimated rate
    /// * `sample_rate` - Rate of `samples` in Hz
    fn classify(&mut self, samples: &[f32], sample_rate: u32) -> Classification;
}

impl<F> KeyClassifier for F
where
    F: FnMut(&[f32], u32) -> Classification + Send,
{
    fn classify(&mut self, samples: &[f32], sample_rate: u32) -> Classification {
        self(samples, sample_rate)
    }
}
