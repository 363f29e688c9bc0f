//! Pre-built ACS benchmark task definitions.
//!
//! These are configuration data: fixed column lists, population filters, and
//! label thresholds for the standard PUMS prediction tasks. The protected
//! group is the `RAC1P` race code throughout.

use crate::filter::Expr;
use crate::task::{Feature, LabelRule, Postprocess, TaskDefinition};

fn features(names: &[&str]) -> Vec<Feature> {
    names.iter().map(|name| Feature::raw(name)).collect()
}

/// Population filter mimicking the extraction conditions of the original
/// Adult dataset: working-age respondents with real income, hours, and a
/// positive survey weight.
#[must_use]
pub fn adult_filter() -> Expr {
    Expr::And(vec![
        Expr::Gt("AGEP".into(), 16.0),
        Expr::Gt("PINCP".into(), 100.0),
        Expr::Gt("WKHP".into(), 0.0),
        Expr::GtEq("PWGTP".into(), 1.0),
    ])
}

/// Predict whether a person's income exceeds $50,000.
#[must_use]
pub fn income() -> TaskDefinition {
    TaskDefinition::new(
        "income",
        features(&[
            "AGEP", "COW", "SCHL", "MAR", "OCCP", "POBP", "RELP", "WKHP", "SEX", "RAC1P",
        ]),
        "PINCP",
        LabelRule::GreaterThan(50000.0),
        "RAC1P",
        adult_filter(),
        Postprocess::Scale,
    )
}

/// Predict whether a person is employed (ESR code 1, civilian employed at
/// work), over the full adult population with no pre-filter.
#[must_use]
pub fn employment() -> TaskDefinition {
    TaskDefinition::new(
        "employment",
        features(&[
            "AGEP", "SCHL", "MAR", "RELP", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC", "NATIVITY",
            "DEAR", "DEYE", "DREM", "SEX", "RAC1P",
        ]),
        "ESR",
        LabelRule::Equals(1.0),
        "RAC1P",
        Expr::AlwaysTrue,
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Predict whether a person is covered by health insurance purchased
/// directly from an insurer (HINS2 code 1).
#[must_use]
pub fn health_insurance() -> TaskDefinition {
    TaskDefinition::new(
        "health_insurance",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC", "NATIVITY",
            "DEAR", "DEYE", "DREM", "RACAIAN", "RACASN", "RACBLK", "RACNH", "RACPI", "RACSOR",
            "RACWHT", "PINCP", "ESR", "ST", "FER",
        ]),
        "HINS2",
        LabelRule::Equals(1.0),
        "RAC1P",
        Expr::AlwaysTrue,
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Population filter for the public coverage task: low-income people not yet
/// eligible for Medicare.
#[must_use]
pub fn public_coverage_filter() -> Expr {
    Expr::And(vec![
        Expr::Lt("AGEP".into(), 65.0),
        Expr::LtEq("PINCP".into(), 30000.0),
    ])
}

/// Predict whether a low-income person is on public health insurance
/// (PUBCOV code 1).
#[must_use]
pub fn public_coverage() -> TaskDefinition {
    TaskDefinition::new(
        "public_coverage",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIG", "MIL", "ANC", "NATIVITY",
            "DEAR", "DEYE", "DREM", "PINCP", "ESR", "ST", "FER", "RAC1P",
        ]),
        "PUBCOV",
        LabelRule::Equals(1.0),
        "RAC1P",
        public_coverage_filter(),
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Population filter for the travel time task: employed adults with a
/// positive survey weight.
#[must_use]
pub fn travel_time_filter() -> Expr {
    Expr::And(vec![
        Expr::Gt("AGEP".into(), 16.0),
        Expr::GtEq("PWGTP".into(), 1.0),
        Expr::Eq("ESR".into(), 1.0),
    ])
}

/// Predict whether a worker's commute exceeds 20 minutes (JWMNP).
#[must_use]
pub fn travel_time() -> TaskDefinition {
    TaskDefinition::new(
        "travel_time",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "RELP", "RAC1P", "PUMA", "ST",
            "CIT", "OCCP", "JWTR", "POWPUMA", "POVPIP",
        ]),
        "JWMNP",
        LabelRule::GreaterThan(20.0),
        "RAC1P",
        travel_time_filter(),
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Predict whether a young adult (18 to 35 exclusive) moved address in the
/// last year (MIG code 1).
#[must_use]
pub fn mobility() -> TaskDefinition {
    TaskDefinition::new(
        "mobility",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "CIT", "MIL", "ANC", "NATIVITY", "RELP",
            "DEAR", "DEYE", "DREM", "RAC1P", "GCL", "COW", "ESR", "WKHP", "JWMNP", "PINCP",
        ]),
        "MIG",
        LabelRule::Equals(1.0),
        "RAC1P",
        Expr::And(vec![
            Expr::Gt("AGEP".into(), 18.0),
            Expr::Lt("AGEP".into(), 35.0),
        ]),
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Population filter for the filtered employment task: working-age
/// respondents under 90 with a positive survey weight.
#[must_use]
pub fn employment_filter() -> Expr {
    Expr::And(vec![
        Expr::Gt("AGEP".into(), 16.0),
        Expr::Lt("AGEP".into(), 90.0),
        Expr::GtEq("PWGTP".into(), 1.0),
    ])
}

/// The employment task restricted to the working-age population.
#[must_use]
pub fn employment_filtered() -> TaskDefinition {
    TaskDefinition::new(
        "employment_filtered",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "CIT", "MIL", "ANC", "NATIVITY",
            "RELP", "DEAR", "DEYE", "DREM", "RAC1P", "GCL",
        ]),
        "ESR",
        LabelRule::Equals(1.0),
        "RAC1P",
        employment_filter(),
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Predict whether a person's income-to-poverty ratio is below 250%
/// (POVPIP).
#[must_use]
pub fn income_poverty_ratio() -> TaskDefinition {
    TaskDefinition::new(
        "income_poverty_ratio",
        features(&[
            "AGEP", "SCHL", "MAR", "SEX", "DIS", "ESP", "MIG", "CIT", "MIL", "ANC", "NATIVITY",
            "RELP", "DEAR", "DEYE", "DREM", "RAC1P", "GCL", "ESR", "OCCP", "WKHP",
        ]),
        "POVPIP",
        LabelRule::LessThan(250.0),
        "RAC1P",
        Expr::AlwaysTrue,
        Postprocess::ImputeThenScale { fill: -1.0 },
    )
}

/// Every pre-built task, for iteration in benchmark harnesses.
#[must_use]
pub fn all_tasks() -> Vec<TaskDefinition> {
    vec![
        income(),
        employment(),
        health_insurance(),
        public_coverage(),
        travel_time(),
        mobility(),
        employment_filtered(),
        income_poverty_ratio(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_complete_and_consistent() {
        let tasks = all_tasks();
        assert_eq!(tasks.len(), 8);
        for task in &tasks {
            assert!(!task.feature_names().is_empty());
            assert_eq!(task.group(), "RAC1P");
        }
    }

    #[test]
    fn income_declares_adult_filter_columns() {
        let task = income();
        let required = task.preprocess().required_columns();
        for col in ["AGEP", "PINCP", "WKHP", "PWGTP"] {
            assert!(required.contains(col));
        }
        assert_eq!(task.feature_names().len(), 10);
        assert_eq!(task.feature_names()[0], "AGEP");
        assert_eq!(task.target(), "PINCP");
    }
}
