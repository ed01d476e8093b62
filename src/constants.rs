//! Competition identifier tables shared by schema detection and id mapping.
//!
//! Legacy ids are the kebab-case slugs the flat schema used as match file
//! names (`data/matches/six-nations.json`); current ids are the short codes
//! of the normalized schema (`data/matches/m6n/2026.json`).

// Legacy slug <-> current short code. Each side is unique, so the pairs are
// mutual inverses.
pub const COMPETITION_ID_PAIRS: &[(&str, &str)] = &[
    ("six-nations", "m6n"),
    ("six-nations-women", "w6n"),
    ("six-nations-u20", "u6n"),
    ("top14", "t14"),
    ("jrlo_div1", "jrlo-div1"),
    ("jrlo_div2", "jrlo-div2"),
    ("jrlo_div3", "jrlo-div3"),
    ("gallagher-premiership", "premier"),
    ("urc", "urc"),
    ("epcr-champions", "epcr-champions"),
    ("epcr-challenge", "epcr-challenge"),
    ("super-rugby-pacific", "srp"),
    ("rugby-championship", "trc"),
    ("autumn-nations-series", "ans"),
    ("world-rugby-internationals", "wr"),
];

// Older spellings that still resolve forward but are never produced when
// mapping current -> legacy.
pub const LEGACY_COMPETITION_ALIASES: &[(&str, &str)] = &[
    ("league-one", "jrlo-div1"),
    ("jrlo", "jrlo-div1"),
    ("premiership", "premier"),
    ("ecc", "epcr-champions"),
    ("ech", "epcr-challenge"),
];

/// National-team competitions and the team-id category they key teams by.
pub const NATIONAL_TEAM_CATEGORIES: &[(&str, &str)] = &[
    ("m6n", "M"),
    ("w6n", "W"),
    ("u6n", "U20"),
    ("trc", "M"),
    ("ans", "M"),
    ("wr", "M"),
];

/// Suffixes a national team id may carry after the country code.
pub const NATIONAL_TEAM_VARIANTS: &[&str] = &["A", "XV", "Barbarians", "Dev"];

/// Sponsor names that upstream sources prepend or append to club names.
pub const SPONSOR_PREFIXES: &[&str] = &["DHL", "ISUZU", "GALLAGHER", "Hollywoodbets", "Vodacom"];
pub const SPONSOR_SUFFIXES: &[&str] = &[
    "GIO",
    "HBF",
    "FMG",
    "SKY",
    "DHL",
    "ISUZU",
    "GALLAGHER",
    "4R",
    "FOUR R",
    "CHURCHILL",
    "MCLEAN",
    "HIF",
    "HFC BANK",
];

/// Get all current competition ids known to the mapping table
pub fn current_competition_ids() -> Vec<&'static str> {
    COMPETITION_ID_PAIRS.iter().map(|(_, current)| *current).collect()
}

/// Get all legacy spellings, aliases included
pub fn legacy_competition_ids() -> Vec<&'static str> {
    COMPETITION_ID_PAIRS
        .iter()
        .chain(LEGACY_COMPETITION_ALIASES.iter())
        .map(|(legacy, _)| *legacy)
        .collect()
}

/// Team-id category for a national-team competition, if it is one
pub fn national_team_category(competition_id: &str) -> Option<&'static str> {
    NATIONAL_TEAM_CATEGORIES
        .iter()
        .find(|(id, _)| *id == competition_id)
        .map(|(_, category)| *category)
}
