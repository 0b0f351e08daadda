use super::{Error, RuntimeNames};
use crate::header::MemberKey;
use crate::jvm::references::MethodRef;
use crate::jvm::{Name, UnqualifiedName};
use std::collections::HashMap;

pub struct Settings {
    /// Minimum similarity for a submission declaration to be paired with a reference one
    ///
    /// Similarities are in `[0, 1]`, so `0` pairs everything with something and `1` only pairs
    /// identical names. Set it through [`Settings::set_similarity_threshold`] to have it checked.
    pub similarity_threshold: f64,

    /// Call sites to redirect, keyed by the member they originally invoke
    ///
    /// Replacements are always invoked with `invokestatic`, so a replacement for an instance
    /// method must take the receiver as its first parameter.
    pub replacements: HashMap<MemberKey, MethodRef>,

    /// Classes of the runtime that rewritten code calls into
    pub runtime: RuntimeNames,

    /// Suffix appended to the names of lambda bodies taken from reference classes
    ///
    /// This keeps them from colliding with the lambda bodies the submission declares, since
    /// both are named `lambda$<method>$<n>` by `javac`.
    pub solution_lambda_suffix: UnqualifiedName,
}

impl Settings {
    pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

    pub fn new() -> Result<Settings, Error> {
        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
            N::from_string(name.into()).map_err(Error::MalformedName)
        }

        Ok(Settings {
            similarity_threshold: Self::DEFAULT_SIMILARITY_THRESHOLD,
            replacements: HashMap::new(),
            runtime: RuntimeNames::new(),
            solution_lambda_suffix: make_name("$solution")?,
        })
    }

    /// Change the similarity threshold, rejecting anything outside `[0, 1]` (including `NaN`)
    pub fn set_similarity_threshold(&mut self, threshold: f64) -> Result<(), Error> {
        self.similarity_threshold = Self::checked_threshold(threshold)?;
        Ok(())
    }

    pub(crate) fn checked_threshold(threshold: f64) -> Result<f64, Error> {
        if (0.0..=1.0).contains(&threshold) {
            Ok(threshold)
        } else {
            Err(Error::InvalidThreshold(threshold))
        }
    }

    /// Redirect every call to `original` to the static method `replacement`
    pub fn add_replacement(&mut self, original: MemberKey, replacement: MethodRef) {
        self.replacements.insert(original, replacement);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn threshold_must_be_a_similarity() {
        let mut settings = Settings::new().unwrap();
        settings.set_similarity_threshold(0.0).unwrap();
        settings.set_similarity_threshold(1.0).unwrap();
        settings.set_similarity_threshold(0.8).unwrap();
        assert_eq!(settings.similarity_threshold, 0.8);

        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let result = settings.set_similarity_threshold(bad);
            assert!(matches!(result, Err(Error::InvalidThreshold(_))));
        }
        assert_eq!(settings.similarity_threshold, 0.8);
    }
}
