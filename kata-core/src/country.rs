//! Country name/code lookup and flag emoji.

/// ISO 3166-1 alpha-2 code and English name.
pub const COUNTRIES: &[(&str, &str)] = &[
    ("AR", "Argentina"),
    ("AU", "Australia"),
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("BG", "Bulgaria"),
    ("CA", "Canada"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("HR", "Croatia"),
    ("CU", "Cuba"),
    ("CZ", "Czech Republic"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GE", "Georgia"),
    ("DE", "Germany"),
    ("GR", "Greece"),
    ("HU", "Hungary"),
    ("IN", "India"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KZ", "Kazakhstan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MN", "Mongolia"),
    ("MA", "Morocco"),
    ("NL", "Netherlands"),
    ("NZ", "New Zealand"),
    ("NO", "Norway"),
    ("PE", "Peru"),
    ("PH", "Philippines"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RS", "Serbia"),
    ("SK", "Slovakia"),
    ("SI", "Slovenia"),
    ("ZA", "South Africa"),
    ("ES", "Spain"),
    ("SE", "Sweden"),
    ("CH", "Switzerland"),
    ("TR", "Turkey"),
    ("UA", "Ukraine"),
    ("GB", "United Kingdom"),
    ("US", "United States"),
    ("UZ", "Uzbekistan"),
    ("VE", "Venezuela"),
];

/// Shown when a country is not in the table.
pub const FALLBACK_FLAG: &str = "🏳️";

/// Resolve a country given either its alpha-2 code or its English name.
pub fn lookup(name_or_code: &str) -> Option<(&'static str, &'static str)> {
    let needle = name_or_code.trim();
    COUNTRIES
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(needle) || name.eq_ignore_ascii_case(needle))
        .copied()
}

/// Flag emoji built from the regional indicator symbols of a two-letter code.
pub fn flag_for_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    code.chars()
        .map(|c| char::from_u32(0x1F1E6 + (c.to_ascii_uppercase() as u32 - 'A' as u32)))
        .collect()
}

/// Flag for a stored country value, or the fallback flag.
pub fn flag(name_or_code: &str) -> String {
    lookup(name_or_code)
        .and_then(|(code, _)| flag_for_code(code))
        .unwrap_or_else(|| FALLBACK_FLAG.to_string())
}
