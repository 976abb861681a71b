//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// A postal address split the way branches and client addresses store it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PostalAddress {
    pub street: String,
    pub commune: String,
    pub city: String,
}

impl PostalAddress {
    pub fn new(
        street: impl Into<String>,
        commune: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            commune: commune.into(),
            city: city.into(),
        }
    }

    /// Single-line form used as a free-text query for the mapping service.
    ///
    /// `"street, commune, city"`; when the commune is missing only the city is
    /// appended, and when the city is missing the street is returned alone.
    pub fn one_line(&self) -> String {
        format_full_address(&self.street, &self.commune, &self.city)
    }
}

impl std::fmt::Display for PostalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.one_line())
    }
}

/// Join address parts into a single line, skipping blank commune/city
pub fn format_full_address(street: &str, commune: &str, city: &str) -> String {
    let street = street.trim();
    let commune = commune.trim();
    let city = city.trim();

    match (commune.is_empty(), city.is_empty()) {
        (false, false) => format!("{}, {}, {}", street, commune, city),
        (true, false) => format!("{}, {}", street, city),
        _ => street.to_string(),
    }
}
