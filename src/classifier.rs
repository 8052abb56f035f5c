// ===============================
// src/classifier.rs
// ===============================
//
// Ledger line -> category set. Rules run in priority order, first match wins:
//   1. sale operation with a vendor SKU            -> Sale
//   2. return document                             -> Return
//   3. logistics operation                         -> Logistics (+ Cancelled if return_amount >= 1)
//   4. any fee (penalty/storage/deduction/acceptance) -> OtherFee, else Unclassified
//
// Neither doc_type_name nor supplier_oper_name alone describes every row, so both are read.
//
use crate::domain::{
    Category, CategorySet, ClassifiedEntry, LedgerEntry, LOGISTICS_TAG, RETURN_DOC_TAG, SALE_TAG,
};
use crate::metrics::ENTRIES_CLASSIFIED;

pub fn classify(entry: &LedgerEntry) -> CategorySet {
    if entry.supplier_oper_name == SALE_TAG && !entry.sa_name.is_empty() {
        return CategorySet::only(Category::Sale);
    }
    if entry.doc_type_name == RETURN_DOC_TAG {
        return CategorySet::only(Category::Return);
    }
    if entry.supplier_oper_name == LOGISTICS_TAG {
        let set = CategorySet::only(Category::Logistics);
        return if entry.return_amount >= 1 { set.with(Category::Cancelled) } else { set };
    }
    let has_fee = [entry.penalty, entry.storage_fee, entry.deduction, entry.acceptance]
        .iter()
        .any(|v| *v != 0.0);
    if has_fee {
        CategorySet::only(Category::OtherFee)
    } else {
        CategorySet::only(Category::Unclassified)
    }
}

/// Classify a whole fetch result, keeping input order.
pub fn classify_all(entries: Vec<LedgerEntry>) -> Vec<ClassifiedEntry> {
    entries
        .into_iter()
        .map(|entry| {
            let categories = classify(&entry);
            for c in categories.iter() {
                ENTRIES_CLASSIFIED.with_label_values(&[c.as_str()]).inc();
            }
            ClassifiedEntry { entry, categories }
        })
        .collect()
}
