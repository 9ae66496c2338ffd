mod common;

use std::fs;

use common::TestWorkspace;
use listing_pipeline::{
    cleaning::{clean, clean_table},
    coerce::{CRORE, coerce_amount},
    error::PipelineError,
    normalize::normalize_column_name,
};
use proptest::prelude::*;

#[test]
fn clean_reports_gaps_and_overwrites_destination() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "raw.csv",
        "Property ID,Micro Market,Ticket Price (Cr)\nP1,Hebbal,\"1,250.5 Cr\"\nP2,Whitefield,TBD\n",
    );
    let output = workspace.write("clean.csv", "stale contents that must disappear\n");

    let report = clean(&input, &output).expect("clean succeeds");
    assert_eq!(report.rows, 2);
    assert_eq!(report.coerced, 1);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].row, 2);
    assert_eq!(report.gaps[0].raw, "TBD");

    let contents = fs::read_to_string(&output).expect("read output");
    assert_eq!(
        contents,
        "property_id,micro_market,ticket_price_cr,ticket_price_inr\n\
P1,Hebbal,1250.5,12505000000.0\n\
P2,Whitefield,,\n"
    );
}

#[test]
fn header_only_input_yields_header_only_output() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("raw.csv", "Ticket Price (Cr)\n");
    let output = workspace.path().join("clean.csv");
    let report = clean(&input, &output).expect("clean succeeds");
    assert_eq!(report.rows, 0);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "ticket_price_cr,ticket_price_inr\n"
    );
}

#[test]
fn missing_input_surfaces_typed_error() {
    let workspace = TestWorkspace::new();
    let err = clean(
        &workspace.path().join("absent.csv"),
        &workspace.path().join("out.csv"),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::InputNotFound { .. })
    ));
}

#[test]
fn empty_file_is_malformed() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("raw.csv", "");
    let err = clean(&input, &workspace.path().join("out.csv")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MalformedInput { .. })
    ));
}

proptest! {
    #[test]
    fn normalization_is_idempotent(label in "\\PC{0,24}") {
        let once = normalize_column_name(&label);
        prop_assert_eq!(normalize_column_name(&once), once.clone());
        prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn plain_amounts_survive_coercion(amount in 0.0f64..1.0e6) {
        prop_assert_eq!(coerce_amount(&amount.to_string()), Some(amount));
        prop_assert_eq!(coerce_amount(&format!("{amount} Cr")), Some(amount));
    }

    #[test]
    fn derived_price_is_crore_price_times_ten_million(raw in "[0-9]{1,4}(\\.[0-9]{1,3})?( Cr)?|[a-z ]{0,6}") {
        let headers = vec!["Ticket Price (Cr)".to_string()];
        let (table, _) = clean_table(&headers, vec![vec![raw]]);
        let row = &table.rows[0];
        match (row[0].parse::<f64>(), row[1].parse::<f64>()) {
            (Ok(price), Ok(derived)) => prop_assert_eq!(derived, price * CRORE),
            _ => {
                prop_assert!(row[0].is_empty());
                prop_assert!(row[1].is_empty());
            }
        }
    }
}
