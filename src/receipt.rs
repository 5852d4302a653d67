//! Receipt
//!
//! A rendered view of a reconciled checkout or order: one row per line with
//! its catalogue discount, then the order-level discounts and totals.

use std::{fmt::Write, io};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::{SmallVec, smallvec};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    catalogue::{Catalogue, VariantKey},
    checkout::Checkout,
    discounts::{DiscountType, percent_points, records::DiscountRecord},
    lines::Line,
    order::Order,
    pricing::{PriceError, floor_at_zero, total_price},
};

/// Errors that can occur when building a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapper for money helper errors.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// A line's variant is not in the catalogue.
    #[error("Missing variant")]
    MissingVariant(VariantKey),

    /// IO error
    #[error("IO error")]
    IO,
}

/// One receipt row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLine<'a> {
    /// Product name.
    pub product: String,

    /// Variant name.
    pub variant: String,

    /// Quantity.
    pub quantity: u32,

    /// Listed unit price.
    pub undiscounted_unit_price: Money<'a, Currency>,

    /// Unit price after catalogue promotions.
    pub unit_price: Money<'a, Currency>,

    /// Line total after catalogue promotions.
    pub total: Money<'a, Currency>,

    /// Names of the catalogue discounts on the line.
    pub promotions: SmallVec<[String; 2]>,
}

/// An order-level discount shown under the lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptDiscount<'a> {
    /// Display label.
    pub label: String,

    /// Amount taken off.
    pub amount: Money<'a, Currency>,
}

/// Final receipt for a reconciled checkout or order.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    title: String,
    lines: Vec<ReceiptLine<'a>>,
    discounts: Vec<ReceiptDiscount<'a>>,
    subtotal: Money<'a, Currency>,
    shipping: Money<'a, Currency>,
    total: Money<'a, Currency>,
    currency: &'a Currency,
}

impl<'a> Receipt<'a> {
    /// Build a receipt from a reconciled checkout. The order-level discount
    /// is the checkout's discount summary.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if a variant is missing or a total cannot
    /// be calculated.
    pub fn from_checkout(
        title: impl Into<String>,
        checkout: &Checkout<'a>,
        catalogue: &Catalogue<'_>,
    ) -> Result<Self, ReceiptError> {
        let currency = checkout.currency();
        let lines = receipt_lines(checkout.lines(), catalogue)?;

        let discounts = if checkout.discount.is_none() {
            Vec::new()
        } else {
            vec![ReceiptDiscount {
                label: checkout
                    .discount
                    .translated_name
                    .clone()
                    .or_else(|| checkout.discount.name.clone())
                    .unwrap_or_else(|| "Discount".to_string()),
                amount: checkout.discount.amount,
            }]
        };

        let shipping = checkout.base_total.sub(checkout.base_subtotal)?;
        let total = floor_at_zero(checkout.base_total.sub(checkout.discount.amount)?);

        Ok(Self {
            title: title.into(),
            subtotal: undiscounted_subtotal(checkout.lines(), currency)?,
            lines,
            discounts,
            shipping,
            total,
            currency,
        })
    }

    /// Build a receipt from a reconciled order. Every order-level discount
    /// record becomes its own row.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if a variant is missing or a total cannot
    /// be calculated.
    pub fn from_order(
        title: impl Into<String>,
        order: &Order<'a>,
        catalogue: &Catalogue<'_>,
    ) -> Result<Self, ReceiptError> {
        let currency = order.currency();
        let lines = receipt_lines(order.lines(), catalogue)?;

        let discounts: Vec<ReceiptDiscount<'a>> = order
            .discounts
            .iter()
            .filter(|record| record.amount.to_minor_units() > 0)
            .map(|record| ReceiptDiscount {
                label: discount_label(record),
                amount: record.amount,
            })
            .collect();

        let discounted = total_price(currency, discounts.iter().map(|discount| discount.amount))?;
        let total = floor_at_zero(order.base_total.sub(discounted)?);

        Ok(Self {
            title: title.into(),
            subtotal: undiscounted_subtotal(order.lines(), currency)?,
            lines,
            discounts,
            shipping: order.base_shipping_price,
            total,
            currency,
        })
    }

    /// Receipt heading.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Line rows.
    pub fn lines(&self) -> &[ReceiptLine<'a>] {
        &self.lines
    }

    /// Order-level discounts.
    pub fn discounts(&self) -> &[ReceiptDiscount<'a>] {
        &self.discounts
    }

    /// Total of listed prices before any discount
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Shipping before order-level discounts
    pub fn shipping(&self) -> Money<'a, Currency> {
        self.shipping
    }

    /// Amount to pay
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Currency used for all monetary values
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Everything taken off the listed prices and shipping.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the arithmetic fails.
    pub fn savings(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.subtotal.add(self.shipping)?.sub(self.total)
    }

    /// Savings as a fraction of subtotal plus shipping.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the arithmetic fails.
    pub fn savings_percent(&self) -> Result<Percentage, MoneyError> {
        let savings = self.savings()?;
        let before = self.subtotal.add(self.shipping)?.to_minor_units();

        if before == 0 {
            return Ok(Percentage::from(0.0));
        }

        let fraction = Decimal::from(savings.to_minor_units())
            .checked_div(Decimal::from(before))
            .unwrap_or(Decimal::ZERO);

        Ok(Percentage::from(fraction))
    }

    /// Prints the receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();
        let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = smallvec![];

        builder.push_record([
            "",
            "Item",
            "Qty",
            "Unit Price",
            "Discounted",
            "Total",
            "Promotion",
        ]);

        for (idx, line) in self.lines.iter().enumerate() {
            let row = idx + 1;
            let discounted = if line.unit_price == line.undiscounted_unit_price {
                String::new()
            } else {
                color_ops.push((row, 4, Color::FG_GREEN));
                format!("{}", line.unit_price)
            };

            builder.push_record([
                format!("#{:<3}", idx + 1),
                format!("{} ({})", line.product, line.variant),
                line.quantity.to_string(),
                format!("{}", line.undiscounted_unit_price),
                discounted,
                format!("{}", line.total),
                line.promotions.join("\n"),
            ]);

            color_ops.push((row, 3, color_dark_grey()));
        }

        writeln!(out, "\n \x1b[1m{}\x1b[0m", self.title).map_err(|_err| ReceiptError::IO)?;

        write_receipt_table(&mut out, builder, color_ops)?;
        write_receipt_summary(&mut out, self)?;

        Ok(())
    }
}

fn receipt_lines<'a>(
    lines: &[Line<'a>],
    catalogue: &Catalogue<'_>,
) -> Result<Vec<ReceiptLine<'a>>, ReceiptError> {
    lines
        .iter()
        .map(|line| {
            let variant = catalogue
                .variant(line.variant())
                .ok_or(ReceiptError::MissingVariant(line.variant()))?;

            let product = catalogue
                .product(variant.product)
                .ok_or(ReceiptError::MissingVariant(line.variant()))?;

            Ok(ReceiptLine {
                product: product.name.clone(),
                variant: variant.name.clone(),
                quantity: line.quantity(),
                undiscounted_unit_price: line.undiscounted_unit_price(),
                unit_price: line.base_unit_price(),
                total: line.base_total()?,
                promotions: line
                    .discounts()
                    .iter()
                    .filter(|record| record.discount_type == DiscountType::Promotion)
                    .map(discount_label)
                    .collect(),
            })
        })
        .collect()
}

fn undiscounted_subtotal<'a>(
    lines: &[Line<'a>],
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, PriceError> {
    total_price(currency, lines.iter().map(Line::undiscounted_total_price))
}

fn discount_label(record: &DiscountRecord<'_>) -> String {
    record
        .translated_name
        .clone()
        .or_else(|| record.name.clone())
        .or_else(|| {
            record
                .voucher_code
                .as_ref()
                .map(|code| format!("Voucher {code}"))
        })
        .unwrap_or_else(|| record.discount_type.to_string())
}

fn write_receipt_table(
    out: &mut impl io::Write,
    builder: Builder,
    color_ops: SmallVec<[(usize, usize, Color); 32]>,
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..6), Alignment::right());

    for (row, col, color) in color_ops {
        table.modify((row, col), color);
    }

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "{table_str}").map_err(|_err| ReceiptError::IO)
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    receipt: &Receipt<'_>,
) -> Result<(), ReceiptError> {
    let savings = receipt.savings()?;
    let savings_points = percent_points(receipt.savings_percent()?);

    let mut rows: Vec<(String, String)> = vec![
        (" Subtotal:".to_string(), format!("{}  ", receipt.subtotal())),
        (" Shipping:".to_string(), format!("{}  ", receipt.shipping())),
    ];

    for discount in receipt.discounts() {
        rows.push((format!(" {}:", discount.label), format!("-{}  ", discount.amount)));
    }

    rows.push((
        " \x1b[1mTotal:\x1b[0m".to_string(),
        format!("\x1b[1m{}  \x1b[0m", receipt.total()),
    ));
    rows.push((" Savings:".to_string(), format!("({savings_points:.2}%) {savings}  ")));

    let label_width = rows.iter().map(|(label, _)| visible_width(label)).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, value)| visible_width(value)).max().unwrap_or(0);

    for (label, value) in &rows {
        write_summary_line(out, label, value, label_width, value_width)?;
    }

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
///
/// Box-drawing characters occupy the Unicode range U+2500..U+257F.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ReceiptError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::GBP;
    use slotmap::SlotMap;
    use testresult::TestResult;

    use crate::{
        catalogue::{Product, ProductVariant},
        channels::{Channel, ChannelKey},
        discounts::{
            DiscountSummary, DiscountValue,
            records::{DiscountKey, DiscountScope, NewDiscount},
        },
        lines::LineKey,
        vouchers::VoucherKey,
    };

    use super::*;

    struct Setup<'a> {
        catalogue: Catalogue<'a>,
        channel: Channel<'a>,
        line: Line<'a>,
    }

    fn setup<'a>() -> TestResult<Setup<'a>> {
        let mut catalogue = Catalogue::new();
        let mut channels = SlotMap::<ChannelKey, ()>::with_key();
        let mut line_keys = SlotMap::<LineKey, ()>::with_key();

        let channel = Channel::new(channels.insert(()), "uk", GBP);
        let product = catalogue.add_product(Product {
            name: "Walking Boots".to_string(),
            ..Product::default()
        });
        let variant = catalogue.add_variant(
            ProductVariant::new(product, "EU 42")
                .with_price(channel.key(), Money::from_minor(8000, GBP)),
        );

        let mut line = Line::new(line_keys.insert(()), variant, 2, Money::from_minor(8000, GBP))?;

        let line_key = line.key();

        line.set_discounted_unit_price(Money::from_minor(6000, GBP))?;
        line.discounts_mut().push(
            NewDiscount::new(
                DiscountScope::Line(line_key),
                DiscountType::Promotion,
                DiscountValue::percentage(Decimal::from(25)),
                Money::from_minor(4000, GBP),
            )
            .with_name("Summer Sale: Boots")
            .into_record(DiscountKey::default()),
        );

        Ok(Setup {
            catalogue,
            channel,
            line,
        })
    }

    #[test]
    fn checkout_receipt_uses_summary_and_base_prices() -> TestResult {
        let Setup {
            catalogue,
            channel,
            line,
        } = setup()?;

        let mut checkout = Checkout::new(&channel).with_line(line);

        checkout.base_subtotal = Money::from_minor(12_000, GBP);
        checkout.base_total = Money::from_minor(12_499, GBP);
        checkout.discount = DiscountSummary {
            amount: Money::from_minor(500, GBP),
            name: Some("Welcome".to_string()),
            translated_name: None,
        };

        let receipt = Receipt::from_checkout("basket", &checkout, &catalogue)?;

        assert_eq!(receipt.subtotal(), Money::from_minor(16_000, GBP));
        assert_eq!(receipt.shipping(), Money::from_minor(499, GBP));
        assert_eq!(receipt.total(), Money::from_minor(11_999, GBP));
        assert_eq!(receipt.savings()?, Money::from_minor(4500, GBP));

        let line = receipt.lines().first().ok_or("missing line")?;

        assert_eq!(line.unit_price, Money::from_minor(6000, GBP));
        assert_eq!(line.total, Money::from_minor(12_000, GBP));
        assert_eq!(line.promotions.as_slice(), ["Summer Sale: Boots".to_string()]);

        let labels: Vec<&str> = receipt.discounts().iter().map(|d| d.label.as_str()).collect();

        assert_eq!(labels, vec!["Welcome"]);

        Ok(())
    }

    #[test]
    fn order_receipt_lists_each_record() -> TestResult {
        let Setup {
            catalogue,
            channel,
            line,
        } = setup()?;

        let mut order = Order::new(&channel)
            .with_line(line)
            .with_shipping_price(Money::from_minor(499, GBP));

        order.base_subtotal = Money::from_minor(12_000, GBP);
        order.base_total = Money::from_minor(12_499, GBP);
        order.discounts = vec![
            NewDiscount::new(
                DiscountScope::Order,
                DiscountType::Voucher,
                DiscountValue::percentage(Decimal::ONE_HUNDRED),
                Money::from_minor(499, GBP),
            )
            .with_voucher(VoucherKey::default(), "FREESHIP")
            .into_record(DiscountKey::default()),
            NewDiscount::new(
                DiscountScope::Order,
                DiscountType::Manual,
                DiscountValue::fixed(Decimal::ONE),
                Money::from_minor(0, GBP),
            )
            .into_record(DiscountKey::default()),
        ];

        let receipt = Receipt::from_order("phone", &order, &catalogue)?;

        let labels: Vec<&str> = receipt.discounts().iter().map(|d| d.label.as_str()).collect();

        assert_eq!(labels, vec!["Voucher FREESHIP"]);
        assert_eq!(receipt.total(), Money::from_minor(12_000, GBP));

        Ok(())
    }

    #[test]
    fn missing_variant_is_an_error() -> TestResult {
        let Setup { channel, line, .. } = setup()?;
        let checkout = Checkout::new(&channel).with_line(line);

        let result = Receipt::from_checkout("basket", &checkout, &Catalogue::new());

        assert!(matches!(result, Err(ReceiptError::MissingVariant(_))));

        Ok(())
    }

    #[test]
    fn write_to_renders_lines_and_summary() -> TestResult {
        let Setup {
            catalogue,
            channel,
            line,
        } = setup()?;

        let mut checkout = Checkout::new(&channel).with_line(line);

        checkout.base_subtotal = Money::from_minor(12_000, GBP);
        checkout.base_total = Money::from_minor(12_000, GBP);

        let receipt = Receipt::from_checkout("basket", &checkout, &catalogue)?;

        let mut out = Vec::new();
        receipt.write_to(&mut out)?;

        let output = String::from_utf8(out)?;

        assert!(output.contains("basket"));
        assert!(output.contains("Walking Boots (EU 42)"));
        assert!(output.contains("Summer Sale: Boots"));
        assert!(output.contains("Subtotal:"));
        assert!(output.contains("Total:"));
        assert!(output.contains("(25.00%)"));

        Ok(())
    }

    #[test]
    fn savings_percent_is_zero_when_nothing_is_bought() -> TestResult {
        let Setup { catalogue, channel, .. } = setup()?;
        let receipt = Receipt::from_checkout("empty", &Checkout::new(&channel), &catalogue)?;

        assert_eq!(percent_points(receipt.savings_percent()?), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn colorize_borders_wraps_box_runs() {
        assert_eq!(colorize_borders("a──b"), "a\x1b[90m──\x1b[0mb");
        assert_eq!(visible_width("\x1b[1mTotal:\x1b[0m"), 6);
    }
}
