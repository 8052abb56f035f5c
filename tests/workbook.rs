use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use ledger_report::aggregator::aggregate;
use ledger_report::classifier::classify_all;
use ledger_report::domain::{
    round2, LedgerEntry, ReportParams, StatementRollup, LOGISTICS_TAG, RETURN_DOC_TAG, SALE_TAG,
};
use ledger_report::workbook::{
    render, DATA_ROW, DETAIL_HEADERS, DETAIL_SHEET, OTHER_COSTS_COL, REVENUE_COL, SUMMARY_SHEET,
    TOTALS_COL,
};

fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
    open_workbook_from_rs(Cursor::new(bytes)).expect("valid xlsx")
}

fn float(v: Option<&Data>) -> f64 {
    match v {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        other => panic!("expected number, got {other:?}"),
    }
}

fn text(v: Option<&Data>) -> String {
    match v {
        Some(Data::String(s)) => s.clone(),
        other => panic!("expected string, got {other:?}"),
    }
}

fn sample() -> Vec<LedgerEntry> {
    vec![
        LedgerEntry {
            rrd_id: 1,
            sa_name: "A".into(),
            supplier_oper_name: SALE_TAG.into(),
            doc_type_name: SALE_TAG.into(),
            retail_price: 1234.567,
            ppvz_for_pay: 1000.111,
            sale_dt: "2024-01-03T00:00:00".into(),
            ..Default::default()
        },
        LedgerEntry {
            rrd_id: 2,
            sa_name: "A".into(),
            doc_type_name: RETURN_DOC_TAG.into(),
            supplier_oper_name: RETURN_DOC_TAG.into(),
            retail_price: 234.5,
            ppvz_for_pay: 200.25,
            ..Default::default()
        },
        LedgerEntry {
            rrd_id: 3,
            sa_name: "B".into(),
            supplier_oper_name: LOGISTICS_TAG.into(),
            delivery_rub: 55.555,
            return_amount: 1,
            ..Default::default()
        },
        LedgerEntry {
            rrd_id: 4,
            penalty: 100.0,
            storage_fee: 3.333,
            deduction: 50.0,
            acceptance: 7.0,
            ..Default::default()
        },
    ]
}

#[test]
fn totals_round_trip_to_two_decimals() {
    let classified = classify_all(sample());
    let rollup = aggregate(&classified, &ReportParams::default()).unwrap();
    let mut wb = open(render(&classified, &rollup).unwrap());
    let sheet = wb.worksheet_range(SUMMARY_SHEET).unwrap();

    for (i, (name, value)) in rollup.totals().iter().enumerate() {
        let cell = float(sheet.get_value((DATA_ROW, TOTALS_COL as u32 + i as u32)));
        assert_eq!(cell, round2(*value), "{name}");
    }
    // tax_final sits right after the eleven totals
    let tax_final = float(sheet.get_value((DATA_ROW, TOTALS_COL as u32 + 11)));
    assert_eq!(tax_final, round2(rollup.tax_final));
    assert_eq!(text(sheet.get_value((0, TOTALS_COL as u32))), "TOTALS");
}

#[test]
fn summary_regions_are_addressable() {
    let classified = classify_all(sample());
    let rollup = aggregate(&classified, &ReportParams::default()).unwrap();
    let mut wb = open(render(&classified, &rollup).unwrap());
    let sheet = wb.worksheet_range(SUMMARY_SHEET).unwrap();

    // title band, header band, data
    assert_eq!(text(sheet.get_value((0, REVENUE_COL as u32))), "REVENUE");
    assert_eq!(text(sheet.get_value((1, REVENUE_COL as u32))), "Vendor SKU");
    assert_eq!(text(sheet.get_value((2, 0))), "A");
    assert_eq!(float(sheet.get_value((2, 1))), 1234.567);

    // returns (F), logistics (K), cancelled (O)
    assert_eq!(float(sheet.get_value((2, 7))), 200.25);
    assert_eq!(text(sheet.get_value((2, 10))), "B");
    assert_eq!(text(sheet.get_value((2, 14))), "B");

    // other costs total (T7)
    let other_col = OTHER_COSTS_COL as u32 + 1;
    assert_eq!(float(sheet.get_value((2, other_col))), 100.0);
    assert_eq!(float(sheet.get_value((3, other_col))), 3.33);
    assert_eq!(float(sheet.get_value((6, other_col))), round2(160.333));
}

#[test]
fn detail_sheet_has_row_per_entry() {
    let classified = classify_all(sample());
    let rollup = aggregate(&classified, &ReportParams::default()).unwrap();
    let mut wb = open(render(&classified, &rollup).unwrap());
    let sheet = wb.worksheet_range(DETAIL_SHEET).unwrap();

    assert_eq!(sheet.height(), 1 + 4);
    assert_eq!(text(sheet.get_value((0, 0))), "№");
    assert_eq!(text(sheet.get_value((0, 5))), "Артикул поставщика");
    assert_eq!(float(sheet.get_value((1, 0))), 1.0);
    assert_eq!(text(sheet.get_value((1, 5))), "A");
    assert_eq!(text(sheet.get_value((1, 12))), "2024-01-03");
    assert_eq!(float(sheet.get_value((4, 0))), 4.0);
}

#[test]
fn empty_input_gives_zero_totals_and_header_only_detail() {
    let rollup = aggregate(&[], &ReportParams::default()).unwrap();
    assert_eq!(rollup, StatementRollup::default());

    let mut wb = open(render(&[], &rollup).unwrap());
    let detail = wb.worksheet_range(DETAIL_SHEET).unwrap();
    assert_eq!(detail.height(), 1);
    assert_eq!(detail.width(), DETAIL_HEADERS.len());

    let summary = wb.worksheet_range(SUMMARY_SHEET).unwrap();
    for i in 0..11u32 {
        assert_eq!(float(summary.get_value((DATA_ROW, TOTALS_COL as u32 + i))), 0.0);
    }
}

#[test]
fn large_detail_sheet_keeps_row_order() {
    let entries: Vec<LedgerEntry> = (1..=2_500u64)
        .map(|id| LedgerEntry {
            rrd_id: id,
            sa_name: format!("SKU-{id}"),
            supplier_oper_name: SALE_TAG.into(),
            retail_price: id as f64,
            ..Default::default()
        })
        .collect();
    let classified = classify_all(entries);
    let rollup = aggregate(&classified, &ReportParams::default()).unwrap();
    let mut wb = open(render(&classified, &rollup).unwrap());
    let sheet = wb.worksheet_range(DETAIL_SHEET).unwrap();

    assert_eq!(sheet.height(), 1 + 2_500);
    assert_eq!(text(sheet.get_value((0, 0))), "№");
    for row in [1u32, 1_250, 2_500] {
        assert_eq!(float(sheet.get_value((row, 0))), row as f64);
        assert_eq!(text(sheet.get_value((row, 5))), format!("SKU-{row}"));
    }
}
