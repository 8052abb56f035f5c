// ===============================
// src/domain.rs
// ===============================
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ReportError;

// Upstream tags (statistics API uses Russian labels)
pub const SALE_TAG: &str = "Продажа";
pub const RETURN_DOC_TAG: &str = "Возврат";
pub const LOGISTICS_TAG: &str = "Логистика";

pub const DEFAULT_TAX_RATE: f64 = 0.06;
pub const DEFAULT_DISCOUNT_RATE: f64 = 3.5;

/// Upstream sends `null` for numbers it has no value for; treat it like a missing key.
fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// One line of the seller's realization report. Read-only after fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerEntry {
    // identity / cursor
    #[serde(deserialize_with = "nullable")]
    pub rrd_id: u64,
    #[serde(deserialize_with = "nullable")]
    pub gi_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub srid: String,
    #[serde(deserialize_with = "nullable")]
    pub shk_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub assembly_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub sticker_id: String,
    #[serde(deserialize_with = "nullable")]
    pub kiz: String,

    // product
    #[serde(deserialize_with = "nullable")]
    pub subject_name: String,
    #[serde(deserialize_with = "nullable")]
    pub nm_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub brand_name: String,
    #[serde(deserialize_with = "nullable")]
    pub sa_name: String, // vendor SKU
    #[serde(deserialize_with = "nullable")]
    pub ts_name: String,
    #[serde(deserialize_with = "nullable")]
    pub barcode: String,

    // movement type
    #[serde(deserialize_with = "nullable")]
    pub doc_type_name: String,
    #[serde(deserialize_with = "nullable")]
    pub supplier_oper_name: String,
    #[serde(deserialize_with = "nullable")]
    pub bonus_type_name: String,
    #[serde(deserialize_with = "nullable")]
    pub order_dt: String,
    #[serde(deserialize_with = "nullable")]
    pub sale_dt: String,

    // pricing
    #[serde(deserialize_with = "nullable")]
    pub quantity: i64,
    #[serde(deserialize_with = "nullable")]
    pub retail_price: f64,
    #[serde(deserialize_with = "nullable")]
    pub retail_amount: f64,
    #[serde(deserialize_with = "nullable")]
    pub retail_price_withdisc_rub: f64,
    #[serde(deserialize_with = "nullable")]
    pub product_discount_for_report: f64,
    #[serde(deserialize_with = "nullable")]
    pub supplier_promo: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_spp_prc: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_for_pay: f64, // remittance

    // commission
    #[serde(deserialize_with = "nullable")]
    pub commission_percent: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_kvw_prc_base: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_kvw_prc: f64,
    #[serde(deserialize_with = "nullable")]
    pub sup_rating_prc_up: f64,
    #[serde(deserialize_with = "nullable")]
    pub is_kgvp_v2: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_sales_commission: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_reward: f64,
    #[serde(deserialize_with = "nullable")]
    pub acquiring_fee: f64,
    #[serde(deserialize_with = "nullable")]
    pub acquiring_percent: f64,
    #[serde(deserialize_with = "nullable")]
    pub payment_processing: String,
    #[serde(deserialize_with = "nullable")]
    pub acquiring_bank: String,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_vw: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_vw_nds: f64,

    // logistics
    #[serde(deserialize_with = "nullable")]
    pub delivery_amount: i64,
    #[serde(deserialize_with = "nullable")]
    pub return_amount: i64,
    #[serde(deserialize_with = "nullable")]
    pub delivery_rub: f64,
    #[serde(deserialize_with = "nullable")]
    pub fix_tariff_date_from: String,
    #[serde(deserialize_with = "nullable")]
    pub fix_tariff_date_to: String,
    #[serde(deserialize_with = "nullable")]
    pub srv_dbs: bool,
    #[serde(deserialize_with = "nullable")]
    pub rebill_logistic_cost: f64,
    #[serde(deserialize_with = "nullable")]
    pub rebill_logistic_org: String,
    #[serde(deserialize_with = "nullable")]
    pub dlv_prc: f64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_office_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_office_name: String,
    #[serde(deserialize_with = "nullable")]
    pub office_name: String,
    #[serde(deserialize_with = "nullable")]
    pub site_country: String,
    #[serde(deserialize_with = "nullable")]
    pub gi_box_type_name: String,
    #[serde(deserialize_with = "nullable")]
    pub trbx_id: String,

    // fees
    #[serde(deserialize_with = "nullable")]
    pub penalty: f64,
    #[serde(deserialize_with = "nullable")]
    pub additional_payment: f64,
    #[serde(deserialize_with = "nullable")]
    pub storage_fee: f64,
    #[serde(deserialize_with = "nullable")]
    pub deduction: f64, // advertising & other holds
    #[serde(deserialize_with = "nullable")]
    pub acceptance: f64,

    // partner / customs
    #[serde(deserialize_with = "nullable")]
    pub ppvz_inn: String,
    #[serde(deserialize_with = "nullable")]
    pub ppvz_supplier_name: String,
    #[serde(deserialize_with = "nullable")]
    pub declaration_number: String,
    #[serde(deserialize_with = "nullable")]
    pub is_legal_entity: bool,
    #[serde(deserialize_with = "nullable")]
    pub installment_cofinancing_amount: f64,
    #[serde(deserialize_with = "nullable")]
    pub wibes_wb_discount_percent: f64,
}

impl LedgerEntry {
    pub fn order_date(&self) -> Option<NaiveDate> {
        date_prefix(&self.order_dt)
    }

    pub fn sale_date(&self) -> Option<NaiveDate> {
        date_prefix(&self.sale_dt)
    }
}

/// Upstream timestamps look like `2024-03-01T00:00:00` (sometimes with a zone suffix).
fn date_prefix(s: &str) -> Option<NaiveDate> {
    s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Sale,
    Return,
    Logistics,
    Cancelled,
    OtherFee,
    Unclassified,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Sale,
        Category::Return,
        Category::Logistics,
        Category::Cancelled,
        Category::OtherFee,
        Category::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sale => "sale",
            Category::Return => "return",
            Category::Logistics => "logistics",
            Category::Cancelled => "cancelled",
            Category::OtherFee => "other_fee",
            Category::Unclassified => "unclassified",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Small bitset of categories; an entry can be Logistics and Cancelled at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u8);

impl CategorySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn only(c: Category) -> Self {
        Self(c.bit())
    }

    pub fn with(mut self, c: Category) -> Self {
        self.0 |= c.bit();
        self
    }

    pub fn contains(&self, c: Category) -> bool {
        self.0 & c.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

/// Entry plus the categories derived from it. The entry itself is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEntry {
    pub entry: LedgerEntry,
    pub categories: CategorySet,
}

impl ClassifiedEntry {
    pub fn is(&self, c: Category) -> bool {
        self.categories.contains(c)
    }
}

/// Statement-wide fee totals (penalties, storage, advertising, acceptance).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OtherCosts {
    pub penalties: f64,
    pub storage: f64,
    pub advertising: f64,
    pub acceptance: f64,
}

impl OtherCosts {
    pub fn total(&self) -> f64 {
        self.penalties + self.storage + self.advertising + self.acceptance
    }
}

/// Profit/loss rollup. Values are kept at full precision; use [`round2`] at output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatementRollup {
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub return_deduction: f64,
    pub logistics_expense: f64,
    pub other_expense: f64,
    pub revenue_before_cogs: f64,
    pub estimated_cogs: f64,
    pub revenue_excluding_taxes: f64,
    pub gross_profit: f64,
    pub tax: f64,
    pub net_profit: f64,
    /// Tax computed on net figures; exposed next to `tax`, never in its place.
    pub tax_final: f64,
    pub other_costs: OtherCosts,
}

impl StatementRollup {
    /// The eleven totals in Totals-table column order.
    pub fn totals(&self) -> [(&'static str, f64); 11] {
        [
            ("gross_revenue", self.gross_revenue),
            ("net_revenue", self.net_revenue),
            ("return_deduction", self.return_deduction),
            ("logistics_expense", self.logistics_expense),
            ("other_expense", self.other_expense),
            ("revenue_before_cogs", self.revenue_before_cogs),
            ("estimated_cogs", self.estimated_cogs),
            ("revenue_excluding_taxes", self.revenue_excluding_taxes),
            ("gross_profit", self.gross_profit),
            ("tax", self.tax),
            ("net_profit", self.net_profit),
        ]
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Tax / discount policy for one statement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportParams {
    pub tax_rate: f64,
    pub discount_rate: f64,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self { tax_rate: DEFAULT_TAX_RATE, discount_rate: DEFAULT_DISCOUNT_RATE }
    }
}

impl ReportParams {
    /// Zero (or absent) means "unset" and falls back to the default.
    pub fn resolve(tax_rate: Option<f64>, discount_rate: Option<f64>) -> Result<Self, ReportError> {
        let tax_rate = match tax_rate {
            Some(t) if t != 0.0 => t,
            _ => DEFAULT_TAX_RATE,
        };
        let discount_rate = match discount_rate {
            Some(d) if d != 0.0 => d,
            _ => DEFAULT_DISCOUNT_RATE,
        };
        let params = Self { tax_rate, discount_rate };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if !self.tax_rate.is_finite() || self.tax_rate < 0.0 {
            return Err(ReportError::InvalidParameter(format!(
                "tax rate {} out of range",
                self.tax_rate
            )));
        }
        if !self.discount_rate.is_finite() || self.discount_rate <= 0.0 {
            return Err(ReportError::InvalidParameter(format!(
                "discount rate {} must be a positive number",
                self.discount_rate
            )));
        }
        Ok(())
    }
}

/// Inbound request as handed over by the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub api_key: String,
    pub date_from: String,
    pub date_to: String,
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub discount_rate: Option<f64>,
}

/// Validated form of [`ReportRequest`].
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub api_key: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub params: ReportParams,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<ReportJob, ReportError> {
        if self.api_key.trim().is_empty() {
            return Err(ReportError::InvalidParameter("apiKey is empty".into()));
        }
        let date_from = parse_date("dateFrom", &self.date_from)?;
        let date_to = parse_date("dateTo", &self.date_to)?;
        if date_from > date_to {
            return Err(ReportError::InvalidParameter(format!(
                "dateFrom {date_from} is after dateTo {date_to}"
            )));
        }
        Ok(ReportJob {
            api_key: self.api_key.trim().to_string(),
            date_from,
            date_to,
            params: ReportParams::resolve(self.tax_rate, self.discount_rate)?,
        })
    }
}

pub fn parse_date(field: &str, s: &str) -> Result<NaiveDate, ReportError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        ReportError::InvalidParameter(format!("invalid {field} format {s:?}, use YYYY-MM-DD"))
    })
}
