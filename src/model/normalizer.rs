use unicode_normalization::UnicodeNormalization;

/// Folds names and emails into the form used by unique lookups.
pub trait LookupNormalizer: Send + Sync {
    fn normalize_name(&self, name: &str) -> String;

    fn normalize_email(&self, email: &str) -> String {
        self.normalize_name(email)
    }
}

/// NFC composition followed by uppercase folding.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperInvariantNormalizer;

impl LookupNormalizer for UpperInvariantNormalizer {
    fn normalize_name(&self, name: &str) -> String {
        name.nfc().collect::<String>().to_uppercase()
    }
}

/// Normalizes with the default normalizer.
pub fn normalize(name: &str) -> String {
    UpperInvariantNormalizer.normalize_name(name)
}
