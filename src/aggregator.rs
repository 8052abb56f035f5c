// ===============================
// src/aggregator.rs
// ===============================
use crate::domain::{Category, ClassifiedEntry, OtherCosts, ReportParams, StatementRollup};
use crate::error::ReportError;

/// Fold classified entries into the P&L rollup.
///
/// One left-to-right pass at full f64 precision; nothing is rounded here. Derived
/// totals are computed once after the fold:
///
/// ```text
/// revenue_before_cogs = net_revenue - return_deduction - logistics_expense - other_expense
/// estimated_cogs      = (gross_revenue - revenue_excluding_taxes) / discount_rate
/// gross_profit        = revenue_before_cogs - estimated_cogs
/// tax                 = (gross_revenue - revenue_excluding_taxes) * tax_rate
/// net_profit          = gross_profit - tax
/// tax_final           = (net_revenue - return_deduction) * tax_rate
/// ```
pub fn aggregate(
    entries: &[ClassifiedEntry],
    params: &ReportParams,
) -> Result<StatementRollup, ReportError> {
    // config check happens before the fold, never inside it
    params.validate()?;

    let mut r = StatementRollup::default();
    let mut other = OtherCosts::default();

    for ce in entries {
        let e = &ce.entry;
        if ce.is(Category::Sale) {
            r.gross_revenue += e.retail_price;
            r.net_revenue += e.ppvz_for_pay;
        }
        if ce.is(Category::Return) {
            r.revenue_excluding_taxes += e.retail_price;
            r.return_deduction += e.ppvz_for_pay;
        }
        if ce.is(Category::Logistics) {
            r.logistics_expense += e.delivery_rub;
        }
        // statement-wide, whatever the category
        other.penalties += e.penalty;
        other.storage += e.storage_fee;
        other.advertising += e.deduction;
        other.acceptance += e.acceptance;
    }

    r.other_costs = other;
    r.other_expense = other.total();

    let net_sales_base = r.gross_revenue - r.revenue_excluding_taxes;
    r.revenue_before_cogs =
        r.net_revenue - r.return_deduction - r.logistics_expense - r.other_expense;
    r.estimated_cogs = net_sales_base / params.discount_rate;
    r.gross_profit = r.revenue_before_cogs - r.estimated_cogs;
    r.tax = net_sales_base * params.tax_rate;
    r.net_profit = r.gross_profit - r.tax;
    r.tax_final = (r.net_revenue - r.return_deduction) * params.tax_rate;

    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_all;
    use crate::domain::{round2, LedgerEntry, LOGISTICS_TAG, RETURN_DOC_TAG, SALE_TAG};

    fn sale(sku: &str, price: f64, remit: f64) -> LedgerEntry {
        LedgerEntry {
            sa_name: sku.into(),
            supplier_oper_name: SALE_TAG.into(),
            doc_type_name: SALE_TAG.into(),
            retail_price: price,
            ppvz_for_pay: remit,
            ..Default::default()
        }
    }

    fn ret(sku: &str, price: f64, remit: f64) -> LedgerEntry {
        LedgerEntry {
            sa_name: sku.into(),
            supplier_oper_name: RETURN_DOC_TAG.into(),
            doc_type_name: RETURN_DOC_TAG.into(),
            retail_price: price,
            ppvz_for_pay: remit,
            ..Default::default()
        }
    }

    fn logistics(sku: &str, cost: f64, returns: i64) -> LedgerEntry {
        LedgerEntry {
            sa_name: sku.into(),
            supplier_oper_name: LOGISTICS_TAG.into(),
            delivery_rub: cost,
            return_amount: returns,
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_is_all_zero() {
        let r = aggregate(&[], &ReportParams::default()).unwrap();
        for (name, v) in r.totals() {
            assert_eq!(round2(v), 0.0, "{name}");
        }
        assert_eq!(r.tax_final, 0.0);
    }

    #[test]
    fn sale_offset_by_return() {
        let entries = classify_all(vec![sale("A", 100.0, 94.0), ret("A", 100.0, -94.0)]);
        let r = aggregate(&entries, &ReportParams { tax_rate: 0.06, discount_rate: 3.5 }).unwrap();

        assert_eq!(r.gross_revenue, 100.0);
        assert_eq!(r.net_revenue, 94.0);
        assert_eq!(r.revenue_excluding_taxes, 100.0);
        assert_eq!(r.return_deduction, -94.0);
        // 94 - (-94) - 0 - 0
        assert_eq!(r.revenue_before_cogs, 188.0);
        assert_eq!(r.estimated_cogs, 0.0);
        assert_eq!(r.gross_profit, 188.0);
        assert_eq!(r.tax, 0.0);
        assert_eq!(r.net_profit, 188.0);
        assert_eq!(round2(r.tax_final), 11.28);
    }

    #[test]
    fn full_statement() {
        let fee = LedgerEntry {
            sa_name: "B".into(),
            penalty: 10.0,
            storage_fee: 5.0,
            deduction: 20.0,
            acceptance: 1.0,
            ..Default::default()
        };
        let entries = classify_all(vec![
            sale("A", 1000.0, 800.0),
            sale("B", 500.0, 400.0),
            ret("A", 200.0, 150.0),
            logistics("A", 60.0, 0),
            logistics("B", 40.0, 1),
            fee,
        ]);
        let r = aggregate(&entries, &ReportParams { tax_rate: 0.06, discount_rate: 3.5 }).unwrap();

        assert_eq!(r.gross_revenue, 1500.0);
        assert_eq!(r.net_revenue, 1200.0);
        assert_eq!(r.revenue_excluding_taxes, 200.0);
        assert_eq!(r.return_deduction, 150.0);
        assert_eq!(r.logistics_expense, 100.0);
        assert_eq!(
            r.other_costs,
            OtherCosts { penalties: 10.0, storage: 5.0, advertising: 20.0, acceptance: 1.0 }
        );
        assert_eq!(r.other_expense, 36.0);
        assert_eq!(r.revenue_before_cogs, 1200.0 - 150.0 - 100.0 - 36.0);
        assert_eq!(round2(r.estimated_cogs), round2(1300.0 / 3.5));
        assert_eq!(round2(r.tax), 78.0);
        assert_eq!(round2(r.net_profit), round2(914.0 - 1300.0 / 3.5 - 78.0));
    }

    #[test]
    fn fees_count_for_every_category() {
        let mut s = sale("A", 100.0, 90.0);
        s.penalty = 7.0;
        let mut l = logistics("A", 10.0, 0);
        l.storage_fee = 3.0;
        let r = aggregate(&classify_all(vec![s, l]), &ReportParams::default()).unwrap();
        assert_eq!(r.other_costs.penalties, 7.0);
        assert_eq!(r.other_costs.storage, 3.0);
        assert_eq!(r.other_expense, 10.0);
    }

    #[test]
    fn totals_follow_input_order_summation() {
        let prices = [0.1, 0.2, 0.3, 1e16, -1e16, 0.7, 12.345, 99.99];
        let entries: Vec<_> = prices.iter().map(|p| sale("A", *p, *p)).collect();
        let r = aggregate(&classify_all(entries), &ReportParams::default()).unwrap();

        let mut reference = 0.0;
        for p in prices {
            reference += p;
        }
        assert_eq!(r.gross_revenue, reference);
        assert_eq!(r.net_revenue, reference);
    }

    #[test]
    fn zero_discount_is_invalid() {
        let err = aggregate(&[], &ReportParams { tax_rate: 0.06, discount_rate: 0.0 }).unwrap_err();
        assert!(matches!(err, ReportError::InvalidParameter(_)));
    }

    #[test]
    fn cancelled_logistics_counted_once() {
        let entries = classify_all(vec![logistics("A", 25.0, 1)]);
        let r = aggregate(&entries, &ReportParams::default()).unwrap();
        assert_eq!(r.logistics_expense, 25.0);
    }
}
