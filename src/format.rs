//! Normalization of raw contact fields
//!
//! Pure functions: no state, no I/O. Length problems with phone numbers are
//! diagnostic only; they are logged and reported on the returned value but
//! never reject the input.

use tracing::warn;

use crate::types::{CachedPerson, Photo, PersonId, RawCard};

/// Canonical phone length (US/Canada, without country code)
pub const PHONE_DIGITS: usize = 10;

/// Filler used to left-pad short phone numbers
pub const PHONE_FILLER: char = '_';

// ============================================================================
// Phone
// ============================================================================

/// Why a phone number needed repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneWarning {
    /// More digits than a country-code-1 number; the tail was kept
    TooLong { digits: String },
    /// Fewer than ten digits; left-padded with [`PHONE_FILLER`]
    TooShort { digits: String },
}

/// Phone number reduced to a 10-character canonical buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalPhone {
    digits: String,
    warning: Option<PhoneWarning>,
}

impl CanonicalPhone {
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// The canonical buffer (empty, or exactly ten characters)
    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn warning(&self) -> Option<&PhoneWarning> {
        self.warning.as_ref()
    }

    /// `(801) 555-1234`
    pub fn display(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!(
            "({}) {}-{}",
            &self.digits[0..3],
            &self.digits[3..6],
            &self.digits[6..10]
        )
    }

    /// `+18015551234`
    pub fn dialable(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("+1{}", self.digits)
    }
}

/// Reduce a free-form phone number to its canonical 10-character buffer.
pub fn normalize_phone(raw: &str) -> CanonicalPhone {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return CanonicalPhone::default();
    }

    let mut warning = None;

    if digits.len() > PHONE_DIGITS {
        // An 11-digit number starting with the country code is expected
        if !digits.starts_with('1') || digits.len() > PHONE_DIGITS + 1 {
            warn!(phone = %digits, "phone too long");
            warning = Some(PhoneWarning::TooLong {
                digits: digits.clone(),
            });
        }
        digits = digits.split_off(digits.len() - PHONE_DIGITS);
    }

    if digits.len() < PHONE_DIGITS {
        warn!(phone = %digits, "phone too short");
        warning = Some(PhoneWarning::TooShort {
            digits: digits.clone(),
        });
        let padding = PHONE_DIGITS - digits.len();
        digits = std::iter::repeat(PHONE_FILLER)
            .take(padding)
            .chain(digits.chars())
            .collect();
    }

    CanonicalPhone { digits, warning }
}

// ============================================================================
// Email / gender
// ============================================================================

/// Lower-case and trim an email address; anything without `@` becomes empty.
pub fn normalize_email(raw: &str) -> String {
    if !raw.contains('@') {
        return String::new();
    }
    raw.to_lowercase().trim().to_string()
}

/// Map the directory's gender field to a single-letter tag.
///
/// Only the exact values `FEMALE` and `MALE` are recognized; anything else
/// passes through unchanged.
pub fn normalize_gender(raw: &str) -> String {
    match raw {
        "FEMALE" => "F".to_string(),
        "MALE" => "M".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Person
// ============================================================================

/// Combine a card with its resolved address and photo. Never fetches.
pub fn to_cached_person(
    id: &PersonId,
    card: &RawCard,
    address: &[String],
    photo: &Photo,
) -> CachedPerson {
    let name = card.name.clone().unwrap_or_default();
    let nickname = card
        .spoken_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| name.clone());

    let raw_phone = card
        .individual_phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or(card.phone.as_deref())
        .unwrap_or_default();
    let phone = normalize_phone(raw_phone);

    CachedPerson {
        id: id.clone(),
        name,
        nickname,
        age: card.age,
        gender: normalize_gender(card.gender.as_deref().unwrap_or_default()),
        phone: phone.dialable(),
        phone_display: phone.display(),
        email: normalize_email(card.email.as_deref().unwrap_or_default()),
        address: address.to_vec(),
        image_data_url: photo.to_data_url(),
    }
}
