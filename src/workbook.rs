// ===============================
// src/workbook.rs
// ===============================
//
// xlsx output: one workbook, two sheets.
//
//   "Report"  : five summary regions at fixed anchors (row 1 = title band,
//               row 2 = column headers, row 3.. = data)
//                 A1  revenue        F1  returns        K1  logistics
//                 O1  cancelled      S1  other costs    W1  totals (W..AG, AH = tax_final)
//   "Details" : one row per ledger entry, 67 fixed columns, frozen header.
//
// Layout is computed as plain data first (regions / rows), then written.
//
use std::time::Instant;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::debug;

use crate::domain::{round2, Category, ClassifiedEntry, LedgerEntry, StatementRollup};
use crate::error::ReportError;
use crate::metrics::RENDER_SECONDS;

pub const REPORT_FILENAME: &str = "report_total.xlsx";
pub const SUMMARY_SHEET: &str = "Report";
pub const DETAIL_SHEET: &str = "Details";

/// Row of the first data line in every summary region (0-based).
pub const DATA_ROW: u32 = 2;

// Column anchors (0-based): A, F, K, O, S, W
pub const REVENUE_COL: u16 = 0;
pub const RETURNS_COL: u16 = 5;
pub const LOGISTICS_COL: u16 = 10;
pub const CANCELLED_COL: u16 = 14;
pub const OTHER_COSTS_COL: u16 = 18;
pub const TOTALS_COL: u16 = 22;

/// One spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Num(f64),
    Money(f64),
    Empty,
}

impl Cell {
    fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    fn int(v: i64) -> Self {
        Cell::Num(v as f64)
    }

    fn yes_no(v: bool) -> Self {
        Cell::text(if v { "Да" } else { "Нет" })
    }
}

/// A header-labeled table at a fixed anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRegion {
    pub title: &'static str,
    pub row: u32,
    pub col: u16,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl SummaryRegion {
    pub fn width(&self) -> u16 {
        self.headers.len() as u16
    }
}

/// Named formats, created once per render and shared read-only by all regions.
pub struct StyleSet {
    pub title: Format,
    pub header: Format,
    pub detail_header: Format,
    pub money: Format,
}

impl StyleSet {
    pub fn new() -> Self {
        let banded = Format::new()
            .set_font_size(13)
            .set_bold()
            .set_font_color(Color::White)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::Black);
        Self {
            title: banded.clone().set_background_color(Color::RGB(0x33CC33)),
            header: banded.set_background_color(Color::RGB(0x1E7B1E)).set_text_wrap(),
            detail_header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
            money: Format::new().set_num_format("0.00"),
        }
    }
}

impl Default for StyleSet {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Summary layout
// ---------------------------------------------------------------------------

pub const TOTALS_HEADERS: [&str; 12] = [
    "Gross revenue (retail price)",
    "Net revenue (after marketplace fees)",
    "Return deduction",
    "Logistics expense",
    "Other expense",
    "Revenue before COGS",
    "Estimated COGS",
    "Revenue excluding taxes (returns at retail)",
    "Gross profit",
    "Tax",
    "Net profit",
    "Tax (net basis)",
];

fn sku_rows<'a>(
    entries: &'a [ClassifiedEntry],
    keep: impl Fn(&ClassifiedEntry) -> bool + 'a,
    cols: impl Fn(&LedgerEntry) -> Vec<Cell> + 'a,
) -> Vec<Vec<Cell>> {
    entries.iter().filter(|ce| keep(ce)).map(|ce| cols(&ce.entry)).collect()
}

fn sku_price_remit(e: &LedgerEntry) -> Vec<Cell> {
    vec![
        Cell::Text(e.sa_name.clone()),
        Cell::Money(e.retail_price),
        Cell::Money(e.ppvz_for_pay),
    ]
}

pub fn summary_regions(
    entries: &[ClassifiedEntry],
    rollup: &StatementRollup,
) -> Vec<SummaryRegion> {
    let other = rollup.other_costs;
    let mut totals_row: Vec<Cell> = rollup
        .totals()
        .iter()
        .map(|(_, v)| Cell::Money(round2(*v)))
        .collect();
    totals_row.push(Cell::Money(round2(rollup.tax_final)));

    vec![
        SummaryRegion {
            title: "REVENUE",
            row: 0,
            col: REVENUE_COL,
            headers: vec![
                "Vendor SKU",
                "Retail price",
                "Remittance for sold goods (before logistics and other costs)",
            ],
            rows: sku_rows(entries, |ce| ce.is(Category::Sale), sku_price_remit),
        },
        SummaryRegion {
            title: "RETURNED GOODS",
            row: 0,
            col: RETURNS_COL,
            headers: vec!["Vendor SKU", "Original retail price", "Returned amount"],
            rows: sku_rows(entries, |ce| ce.is(Category::Return), sku_price_remit),
        },
        SummaryRegion {
            title: "LOGISTICS COSTS",
            row: 0,
            col: LOGISTICS_COL,
            headers: vec!["Vendor SKU", "Logistics cost"],
            rows: sku_rows(entries, |ce| ce.is(Category::Logistics), |e| {
                vec![Cell::Text(e.sa_name.clone()), Cell::Money(e.delivery_rub)]
            }),
        },
        SummaryRegion {
            title: "CANCELLED / NOT PURCHASED",
            row: 0,
            col: CANCELLED_COL,
            headers: vec!["Vendor SKU", "Return shipping cost"],
            rows: sku_rows(
                entries,
                |ce| ce.is(Category::Logistics) && ce.is(Category::Cancelled),
                |e| vec![Cell::Text(e.sa_name.clone()), Cell::Money(e.delivery_rub)],
            ),
        },
        SummaryRegion {
            title: "OTHER COSTS",
            row: 0,
            col: OTHER_COSTS_COL,
            headers: vec!["Cost", "Amount"],
            rows: vec![
                vec![Cell::text("Penalties"), Cell::Money(round2(other.penalties))],
                vec![Cell::text("Storage"), Cell::Money(round2(other.storage))],
                vec![Cell::text("Advertising"), Cell::Money(round2(other.advertising))],
                vec![Cell::text("Acceptance"), Cell::Money(round2(other.acceptance))],
                vec![Cell::text("Total"), Cell::Money(round2(rollup.other_expense))],
            ],
        },
        SummaryRegion {
            title: "TOTALS",
            row: 0,
            col: TOTALS_COL,
            headers: TOTALS_HEADERS.to_vec(),
            rows: vec![totals_row],
        },
    ]
}

// ---------------------------------------------------------------------------
// Detail layout (column order is fixed by the downstream consumer)
// ---------------------------------------------------------------------------

pub const DETAIL_HEADERS: [&str; 67] = [
    "№",
    "Номер поставки",
    "Предмет",
    "Код номенклатуры",
    "Бренд",
    "Артикул поставщика",
    "Название",
    "Размер",
    "Баркод",
    "Тип документа",
    "Обоснование для оплаты",
    "Дата заказа покупателем",
    "Дата продажи",
    "Кол-во",
    "Цена розничная",
    "Вайлдберриз реализовал Товар (Пр)",
    "Согласованный продуктовый дисконт, %",
    "Промокод %",
    "Итоговая согласованная скидка, %",
    "Цена розничная с учетом согласованной скидки",
    "Размер снижения кВВ из-за рейтинга, %",
    "Размер изменения кВВ из-за акции, %",
    "Скидка постоянного Покупателя (СПП), %",
    "Размер кВВ, %",
    "Размер  кВВ без НДС, % Базовый",
    "Итоговый кВВ без НДС, %",
    "Вознаграждение с продаж до вычета услуг поверенного, без НДС",
    "Возмещение за выдачу и возврат товаров на ПВЗ",
    "Эквайринг/Комиссии за организацию платежей",
    "Размер комиссии за эквайринг/Комиссии за организацию платежей, %",
    "Тип платежа за Эквайринг/Комиссии за организацию платежей",
    "Вознаграждение Вайлдберриз (ВВ), без НДС",
    "НДС с Вознаграждения Вайлдберриз",
    "К перечислению Продавцу за реализованный Товар",
    "Количество доставок",
    "Количество возврата",
    "Услуги по доставке товара покупателю",
    "Дата начала действия фиксации",
    "Дата конца действия фиксации",
    "Признак услуги платной доставки",
    "Общая сумма штрафов",
    "Корректировка Вознаграждения Вайлдберриз (ВВ)",
    "Виды логистики, штрафов и корректировок ВВ",
    "Стикер МП",
    "Наименование банка-эквайера",
    "Номер офиса",
    "Наименование офиса доставки",
    "ИНН партнера",
    "Партнер",
    "Склад",
    "Страна",
    "Тип коробов",
    "Номер таможенной декларации",
    "Номер сборочного задания",
    "Код маркировки",
    "ШК",
    "Srid",
    "Возмещение издержек по перевозке/по складским операциям с товаром",
    "Организатор перевозки",
    "Хранение",
    "Удержания",
    "Платная приемка",
    "Фиксированный коэффициент склада по поставке",
    "Признак продажи юридическому лицу",
    "Номер короба для платной приемки",
    "Скидка по программе софинансирования",
    "Скидка Wibes, %",
];

fn date_cell(d: Option<chrono::NaiveDate>) -> Cell {
    d.map(|d| Cell::Text(d.format("%Y-%m-%d").to_string())).unwrap_or(Cell::Empty)
}

/// Detail row for entry number `n` (1-based). Same length as [`DETAIL_HEADERS`].
pub fn detail_row(n: usize, e: &LedgerEntry) -> Vec<Cell> {
    vec![
        Cell::int(n as i64),
        Cell::int(e.gi_id),
        Cell::Text(e.subject_name.clone()),
        Cell::int(e.nm_id),
        Cell::Text(e.brand_name.clone()),
        Cell::Text(e.sa_name.clone()),
        Cell::Empty, // product title is not in the feed
        Cell::Text(e.ts_name.clone()),
        Cell::Text(e.barcode.clone()),
        Cell::Text(e.doc_type_name.clone()),
        Cell::Text(e.supplier_oper_name.clone()),
        date_cell(e.order_date()),
        date_cell(e.sale_date()),
        Cell::int(e.quantity),
        Cell::Money(e.retail_price),
        Cell::Money(e.retail_amount),
        Cell::Num(e.product_discount_for_report),
        Cell::Num(e.supplier_promo),
        Cell::Empty, // final agreed discount
        Cell::Money(e.retail_price_withdisc_rub),
        Cell::Num(e.sup_rating_prc_up),
        Cell::Num(e.is_kgvp_v2),
        Cell::Num(e.ppvz_spp_prc),
        Cell::Num(round2(e.commission_percent)),
        Cell::Num(round2(e.ppvz_kvw_prc_base)),
        Cell::Num(round2(e.ppvz_kvw_prc)),
        Cell::Money(e.ppvz_sales_commission),
        Cell::Money(e.ppvz_reward),
        Cell::Money(e.acquiring_fee),
        Cell::Num(e.acquiring_percent),
        Cell::Text(e.payment_processing.clone()),
        Cell::Money(round2(e.ppvz_vw)),
        Cell::Money(e.ppvz_vw_nds),
        Cell::Money(e.ppvz_for_pay),
        Cell::int(e.delivery_amount),
        Cell::int(e.return_amount),
        Cell::Money(e.delivery_rub),
        Cell::Text(e.fix_tariff_date_from.clone()),
        Cell::Text(e.fix_tariff_date_to.clone()),
        Cell::yes_no(e.srv_dbs),
        Cell::Money(e.penalty),
        Cell::Money(e.additional_payment),
        Cell::Text(e.bonus_type_name.clone()),
        Cell::Text(e.sticker_id.clone()),
        Cell::Text(e.acquiring_bank.clone()),
        Cell::int(e.ppvz_office_id),
        Cell::Text(e.ppvz_office_name.clone()),
        Cell::Text(e.ppvz_inn.clone()),
        Cell::Text(e.ppvz_supplier_name.clone()),
        Cell::Text(e.office_name.clone()),
        Cell::Text(e.site_country.clone()),
        Cell::Text(e.gi_box_type_name.clone()),
        Cell::Text(e.declaration_number.clone()),
        Cell::int(e.assembly_id),
        Cell::Text(e.kiz.clone()),
        Cell::int(e.shk_id),
        Cell::Text(e.srid.clone()),
        Cell::Money(e.rebill_logistic_cost),
        Cell::Text(e.rebill_logistic_org.clone()),
        Cell::Money(e.storage_fee),
        Cell::Money(e.deduction),
        Cell::Money(e.acceptance),
        Cell::Num(e.dlv_prc),
        Cell::yes_no(e.is_legal_entity),
        Cell::Text(e.trbx_id.clone()),
        Cell::Money(e.installment_cofinancing_amount),
        Cell::Num(e.wibes_wb_discount_percent),
    ]
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    styles: &StyleSet,
) -> Result<(), ReportError> {
    match cell {
        Cell::Text(s) if s.is_empty() => {}
        Cell::Text(s) => {
            ws.write_string(row, col, s.as_str())?;
        }
        Cell::Num(v) => {
            ws.write_number(row, col, *v)?;
        }
        Cell::Money(v) => {
            ws.write_number_with_format(row, col, *v, &styles.money)?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

fn write_region(
    ws: &mut Worksheet,
    region: &SummaryRegion,
    styles: &StyleSet,
) -> Result<(), ReportError> {
    let (row, col) = (region.row, region.col);
    let last_col = col + region.width().saturating_sub(1);

    // title band
    if last_col > col {
        ws.merge_range(row, col, row, last_col, region.title, &styles.title)?;
    } else {
        ws.write_string_with_format(row, col, region.title, &styles.title)?;
    }
    // column-header band
    for (i, h) in region.headers.iter().enumerate() {
        ws.write_string_with_format(row + 1, col + i as u16, *h, &styles.header)?;
    }
    // data rows
    for (r, cells) in region.rows.iter().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            write_cell(ws, row + DATA_ROW + r as u32, col + c as u16, cell, styles)?;
        }
    }
    Ok(())
}

fn write_summary_sheet(
    ws: &mut Worksheet,
    entries: &[ClassifiedEntry],
    rollup: &StatementRollup,
    styles: &StyleSet,
) -> Result<(), ReportError> {
    ws.set_name(SUMMARY_SHEET)?;
    ws.set_row_height(1, 48)?;
    for region in summary_regions(entries, rollup) {
        for c in region.col..region.col + region.width() {
            ws.set_column_width(c, 18)?;
        }
        write_region(ws, &region, styles)?;
    }
    Ok(())
}

/// Rows go out strictly top to bottom: the sheet is in constant-memory mode and
/// flushes each row once the next one starts.
fn write_detail_sheet(
    ws: &mut Worksheet,
    entries: &[ClassifiedEntry],
    styles: &StyleSet,
) -> Result<(), ReportError> {
    ws.set_name(DETAIL_SHEET)?;
    ws.set_freeze_panes(1, 0)?;
    ws.set_row_height(0, 24)?;
    for (c, h) in DETAIL_HEADERS.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, *h, &styles.detail_header)?;
    }

    for (i, ce) in entries.iter().enumerate() {
        let row = i as u32 + 1;
        for (c, cell) in detail_row(i + 1, &ce.entry).iter().enumerate() {
            write_cell(ws, row, c as u16, cell, styles)?;
        }
    }
    Ok(())
}

/// Render the statement workbook (summary + detail) into xlsx bytes.
pub fn render(
    entries: &[ClassifiedEntry],
    rollup: &StatementRollup,
) -> Result<Vec<u8>, ReportError> {
    let started = Instant::now();
    let styles = StyleSet::new();
    let mut workbook = Workbook::new();

    write_summary_sheet(workbook.add_worksheet(), entries, rollup, &styles)?;
    write_detail_sheet(workbook.add_worksheet_with_constant_memory(), entries, &styles)?;

    let bytes = workbook.save_to_buffer()?;
    RENDER_SECONDS.observe(started.elapsed().as_secs_f64());
    debug!(entries = entries.len(), bytes = bytes.len(), "workbook rendered");
    Ok(bytes)
}
