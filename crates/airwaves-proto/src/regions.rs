//! World regions used to group the directory's country list.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
    /// ISO 3166-1 alpha-2 codes, upper case.
    pub countries: &'static [&'static str],
}

impl Region {
    pub fn contains(&self, country_code: &str) -> bool {
        self.countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country_code))
    }

    pub fn title(&self) -> String {
        format!("{} {}", self.emoji, self.label)
    }
}

pub const REGIONS: &[Region] = &[
    Region {
        id: "north-america",
        label: "North America",
        emoji: "🌎",
        countries: &["US", "CA", "MX", "CU", "JM", "DO", "PR", "GT", "CR", "PA", "HN", "SV", "NI", "HT", "BS", "TT"],
    },
    Region {
        id: "south-america",
        label: "South America",
        emoji: "🌎",
        countries: &["BR", "AR", "CO", "CL", "PE", "VE", "EC", "BO", "UY", "PY", "GY", "SR"],
    },
    Region {
        id: "europe",
        label: "Europe",
        emoji: "🌍",
        countries: &[
            "GB", "IE", "FR", "DE", "NL", "BE", "LU", "CH", "AT", "IT", "ES", "PT", "SE", "NO",
            "DK", "FI", "IS", "PL", "CZ", "SK", "HU", "RO", "BG", "GR", "HR", "SI", "RS", "BA",
            "ME", "MK", "AL", "EE", "LV", "LT", "UA", "BY", "MD", "RU", "MT", "CY",
        ],
    },
    Region {
        id: "middle-east",
        label: "Middle East",
        emoji: "🕌",
        countries: &["TR", "IL", "LB", "JO", "SA", "AE", "QA", "KW", "BH", "OM", "IR", "IQ", "SY", "YE", "PS"],
    },
    Region {
        id: "africa",
        label: "Africa",
        emoji: "🌍",
        countries: &[
            "ZA", "NG", "KE", "GH", "MA", "EG", "TN", "DZ", "SN", "CI", "CM", "ET", "UG", "TZ",
            "ZW", "ZM", "AO", "MZ", "RW", "MU",
        ],
    },
    Region {
        id: "asia",
        label: "Asia",
        emoji: "🌏",
        countries: &[
            "JP", "KR", "CN", "TW", "HK", "IN", "PK", "BD", "LK", "NP", "ID", "PH", "SG", "MY",
            "TH", "VN", "KH", "MN", "KZ", "UZ",
        ],
    },
    Region {
        id: "oceania",
        label: "Oceania",
        emoji: "🌏",
        countries: &["AU", "NZ", "FJ", "PG", "WS", "TO"],
    },
];

pub fn find(id: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id == id)
}
