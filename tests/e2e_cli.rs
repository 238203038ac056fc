mod sqlite_helpers;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;
use tempfile::TempDir;

use cli_helpers::{
    base_cmd, db_path, run_cmd, run_cmd_json, write_file, write_january_statement,
    write_sales_text,
};

fn setup_temp_home() -> TempDir {
    TempDir::new().expect("failed to create temp home")
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string"))
        .expect("valid decimal")
}

#[test]
fn init_seeds_default_rules() {
    let home = setup_temp_home();

    let value = run_cmd_json(&home, &["init"]).unwrap();
    assert_eq!(value["total_rules"], 19);

    // Running init again only upserts
    let again = run_cmd_json(&home, &["init"]).unwrap();
    assert_eq!(again["total_rules"], 19);
}

#[test]
fn rules_list_without_color_when_piped() {
    let home = setup_temp_home();
    run_cmd(&home, &["init"]).unwrap();

    base_cmd(&home)
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REPSOL"))
        .stdout(predicate::str::contains("Fornecedores"))
        .stdout(predicate::str::contains("\u{001b}[").not());
}

#[test]
fn bank_import_is_idempotent() {
    let home = setup_temp_home();
    let statement = write_january_statement(home.path());
    let path = statement.to_str().unwrap();

    let first = run_cmd_json(&home, &["import", "bank", path]).unwrap();
    assert_eq!(first[0]["status"], "ok");
    assert_eq!(first[0]["rows"], 5);
    assert_eq!(first[0]["min_date"], "2025-01-02");
    assert_eq!(first[0]["max_date"], "2025-01-05");

    run_cmd_json(&home, &["import", "bank", path]).unwrap();

    let conn = sqlite_helpers::open_conn(&db_path(&home)).unwrap();
    assert_eq!(sqlite_helpers::count(&conn, "bank_transactions").unwrap(), 5);

    let rows = sqlite_helpers::list_bank_rows(&conn).unwrap();
    let repsol = rows.iter().find(|r| r.0 == "COMPRA REPSOL").unwrap();
    assert_eq!(repsol.1, "-45.30");
    assert_eq!(repsol.2, "debit");
}

#[test]
fn bad_file_in_folder_does_not_stop_batch() {
    let home = setup_temp_home();
    let folder = home.path().join("extratos");
    std::fs::create_dir(&folder).unwrap();
    write_january_statement(&folder);
    write_file(&folder, "a_vazio.csv", b"nada para ver aqui\n");

    let statuses = run_cmd_json(&home, &["import", "bank", folder.to_str().unwrap()]).unwrap();
    let statuses = statuses.as_array().unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0]["file"], "a_vazio.csv");
    assert_eq!(statuses[0]["status"], "error");
    assert_eq!(statuses[0]["message"], "no transaction table found");
    assert_eq!(statuses[1]["status"], "ok");
}

#[test]
fn classify_then_report_categories() {
    let home = setup_temp_home();
    run_cmd(&home, &["init"]).unwrap();
    let statement = write_january_statement(home.path());
    run_cmd(&home, &["import", "bank", statement.to_str().unwrap()]).unwrap();

    let outcome = run_cmd_json(&home, &["classify"]).unwrap();
    assert_eq!(outcome["examined"], 3);
    assert_eq!(outcome["classified"], 2);
    assert_eq!(outcome["unmatched"], 1);

    let again = run_cmd_json(&home, &["classify"]).unwrap();
    assert_eq!(again["classified"], 0);

    let conn = sqlite_helpers::open_conn(&db_path(&home)).unwrap();
    assert_eq!(
        sqlite_helpers::category_of(&conn, "COMPRA REPSOL").unwrap(),
        Some("Fuel".to_string())
    );

    let report = run_cmd_json(&home, &["report", "categories"]).unwrap();
    let categories: Vec<&str> = report["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["category"].as_str().unwrap())
        .collect();
    assert!(categories.contains(&"Unclassified"));
    assert!(categories.contains(&"Electricity"));
    assert_eq!(decimal(&report["total"]), dec!(-125.30));
}

#[test]
fn reconcile_cycle_closes_on_deposit() {
    let home = setup_temp_home();
    let statement = write_january_statement(home.path());
    let sales = write_sales_text(home.path());
    run_cmd(&home, &["import", "bank", statement.to_str().unwrap()]).unwrap();

    let imported = run_cmd_json(&home, &["import", "sales", sales.to_str().unwrap()]).unwrap();
    assert_eq!(imported[0]["rows"], 3);

    let report = run_cmd_json(
        &home,
        &["reconcile", "cycle", "--from", "2025-01-01", "--to", "2025-01-05"],
    )
    .unwrap();

    let days = report["days"].as_array().unwrap();
    assert_eq!(days.len(), 5);
    assert!(days[0]["cash_diff"].is_null());
    assert_eq!(decimal(&days[1]["card_diff"]), Decimal::ZERO);
    assert_eq!(decimal(&days[2]["cash_diff"]), Decimal::ZERO);
    assert_eq!(decimal(&days[2]["pre_deposit_cash"]), dec!(150));
    assert_eq!(days[2]["preloaded_from"]["kind"], "start_of_history");
    assert_eq!(decimal(&report["open_cycle_cash"]), Decimal::ZERO);
}

#[test]
fn reconcile_cycle_table_output() {
    let home = setup_temp_home();
    let statement = write_january_statement(home.path());
    let sales = write_sales_text(home.path());
    run_cmd(&home, &["import", "bank", statement.to_str().unwrap()]).unwrap();
    run_cmd(&home, &["import", "sales", sales.to_str().unwrap()]).unwrap();

    base_cmd(&home)
        .args(["reconcile", "cycle", "--from", "01-01-2025", "--to", "05-01-2025"])
        .assert()
        .success()
        .stdout(predicate::str::contains("03/01/2025"))
        .stdout(predicate::str::contains("Cash not yet banked"))
        .stdout(predicate::str::contains("\u{001b}[").not());
}

#[test]
fn reconcile_cycle_rejects_reversed_range() {
    let home = setup_temp_home();
    base_cmd(&home)
        .args(["reconcile", "cycle", "--from", "2025-02-01", "--to", "2025-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid range"));
}

#[test]
fn reconcile_direct_reports_unmatched() {
    let home = setup_temp_home();
    let statement = write_january_statement(home.path());
    let sales = write_sales_text(home.path());
    run_cmd(&home, &["import", "bank", statement.to_str().unwrap()]).unwrap();
    run_cmd(&home, &["import", "sales", sales.to_str().unwrap()]).unwrap();

    let report = run_cmd_json(&home, &["reconcile", "direct"]).unwrap();
    // Card sale of 80,00 on 02-01 meets the TPA credit of the same day
    assert_eq!(report["matched"].as_array().unwrap().len(), 1);
    assert_eq!(report["unmatched_sales"].as_array().unwrap().len(), 2);
    assert_eq!(report["unmatched_credits"].as_array().unwrap().len(), 1);
    assert!(report["duplicates"].as_array().unwrap().is_empty());
}

#[test]
fn rules_add_and_clear() {
    let home = setup_temp_home();
    let statement = write_january_statement(home.path());
    run_cmd(&home, &["import", "bank", statement.to_str().unwrap()]).unwrap();

    let added = run_cmd_json(&home, &["rules", "add", "LEVANTAMENTO", "Caixa", "-p", "1"]).unwrap();
    assert!(added["id"].as_i64().is_some());

    let outcome = run_cmd_json(&home, &["classify"]).unwrap();
    assert_eq!(outcome["classified"], 1);

    let cleared = run_cmd_json(&home, &["rules", "clear", "--category", "Caixa"]).unwrap();
    assert_eq!(cleared["cleared"], 1);

    let again = run_cmd_json(&home, &["classify"]).unwrap();
    assert_eq!(again["classified"], 1);
}

#[test]
fn unknown_sales_layout_is_an_error() {
    let home = setup_temp_home();
    let sales = write_sales_text(home.path());
    base_cmd(&home)
        .args(["import", "sales", sales.to_str().unwrap(), "--layout", "mensal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown sales layout"));
}
