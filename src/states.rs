//! State code vocabulary for ACS PUMS shards.
//!
//! PUMS files are published per state, named by the two-digit FIPS code
//! (2017 onward) or the lowercased USPS abbreviation (earlier years). The
//! public API always speaks USPS abbreviations.

use crate::error::{AcsError, Result};

/// USPS abbreviation paired with the two-digit FIPS code, for the 50 states
/// plus DC and Puerto Rico.
pub const STATE_CODES: &[(&str, &str)] = &[
    ("AL", "01"),
    ("AK", "02"),
    ("AZ", "04"),
    ("AR", "05"),
    ("CA", "06"),
    ("CO", "08"),
    ("CT", "09"),
    ("DE", "10"),
    ("FL", "12"),
    ("GA", "13"),
    ("HI", "15"),
    ("ID", "16"),
    ("IL", "17"),
    ("IN", "18"),
    ("IA", "19"),
    ("KS", "20"),
    ("KY", "21"),
    ("LA", "22"),
    ("ME", "23"),
    ("MD", "24"),
    ("MA", "25"),
    ("MI", "26"),
    ("MN", "27"),
    ("MS", "28"),
    ("MO", "29"),
    ("MT", "30"),
    ("NE", "31"),
    ("NV", "32"),
    ("NH", "33"),
    ("NJ", "34"),
    ("NM", "35"),
    ("NY", "36"),
    ("NC", "37"),
    ("ND", "38"),
    ("OH", "39"),
    ("OK", "40"),
    ("OR", "41"),
    ("PA", "42"),
    ("RI", "44"),
    ("SC", "45"),
    ("SD", "46"),
    ("TN", "47"),
    ("TX", "48"),
    ("UT", "49"),
    ("VT", "50"),
    ("VA", "51"),
    ("WA", "53"),
    ("WV", "54"),
    ("WI", "55"),
    ("WY", "56"),
    ("DC", "11"),
    ("PR", "72"),
];

/// Look up the FIPS code for a USPS state abbreviation.
///
/// Unknown codes are a configuration error naming the offending code.
pub fn fips_code(state: &str) -> Result<&'static str> {
    STATE_CODES
        .iter()
        .find(|(abbr, _)| *abbr == state)
        .map(|(_, fips)| *fips)
        .ok_or_else(|| AcsError::Configuration(format!("unknown state code: {state}")))
}

/// All known USPS state abbreviations, in publication order.
#[must_use]
pub fn all_states() -> Vec<&'static str> {
    STATE_CODES.iter().map(|(abbr, _)| *abbr).collect()
}
