//! Pure transformation from a fetched record to a receipt submission.
//!
//! No I/O and no clock: the same record, client row and configuration
//! always produce the same payload, so a retried submission is
//! byte-identical to the original.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::api::{
    BuyerAddress, BuyerContacts, BuyerData, ReceiptDetails, ReceiptLine, ReceiptPayment,
};
use crate::config::ServiceConfig;
use crate::store::RecordRow;

// The external API rejects empty strings in these fields, so blanks are
// replaced with fixed placeholders.
const DEFAULT_CUSTOMER_NAME: &str = "Customer name";
const DEFAULT_PHONE: &str = "client phone number";
const DEFAULT_EMAIL: &str = "email address";
const DEFAULT_ADDRESS: &str = "client address";
const DEFAULT_NOTES: &str = "details";

const MAX_STREET_LEN: usize = 100;

/// Format a monetary amount with exactly two decimal digits and a decimal
/// point, independent of host locale. Midpoints round away from zero.
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Build the receipt for one record. Buyer contact fields come from the
/// joined client row when enrichment found one, otherwise from the record
/// itself; either way, blanks fall back to the same placeholders.
pub fn build_receipt(
    record: &RecordRow,
    client: Option<&RecordRow>,
    config: &ServiceConfig,
) -> ReceiptDetails {
    let cols = &config.columns;
    let platform = record.get_string(&cols.platform);
    let transaction_entry = record.get_string(&cols.transaction_entry);
    let details = record.get_string(&cols.details);
    let deal_date = record.get_string(&cols.deal_date);
    let brokerage = record.get_decimal(&cols.brokerage);
    let amount_due = record.get_decimal(&cols.amount_due);

    let (client_name, phone, email, address) = match client {
        Some(row) => {
            let lookup = &config.client_lookup;
            (
                row.get_string(&lookup.client_name_column),
                row.get_string(&lookup.telephone_no_column),
                row.get_string(&lookup.email_address_column),
                row.get_string(&lookup.client_address_column),
            )
        }
        None => (
            record.get_string(&cols.client_name),
            record.get_string(&cols.telephone_no),
            record.get_string(&cols.email_address),
            record.get_string(&cols.client_address),
        ),
    };

    let currency = if platform.eq_ignore_ascii_case(&config.usd_platform_value) {
        config.usd_currency.clone()
    } else {
        config.default_currency.clone()
    };

    let line_amount = format_amount(brokerage);
    let receipt_total = format_amount(brokerage + amount_due);

    let buyer_name = or_placeholder(client_name, DEFAULT_CUSTOMER_NAME);
    let address = or_placeholder(address, DEFAULT_ADDRESS);
    let receipt_date = if deal_date.trim().is_empty() {
        String::new()
    } else {
        deal_date
    };

    ReceiptDetails {
        receipt_type: config.receipt_type,
        receipt_currency: currency,
        device_id: config.device_id.clone(),
        invoice_no: or_placeholder(transaction_entry, "0"),
        buyer_data: BuyerData {
            buyer_register_name: buyer_name.clone(),
            buyer_trade_name: buyer_name,
            vat_number: config.buyer_defaults.vat_number.clone(),
            buyer_tin: config.buyer_defaults.buyer_tin.clone(),
            buyer_contacts: BuyerContacts {
                phone_no: or_placeholder(phone, DEFAULT_PHONE),
                email: or_placeholder(email, DEFAULT_EMAIL),
            },
            buyer_address: BuyerAddress {
                province: config.buyer_defaults.province.clone(),
                street: truncate(&address, MAX_STREET_LEN),
                house_no: address,
                city: config.buyer_defaults.city.clone(),
            },
        },
        receipt_notes: or_placeholder(details, DEFAULT_NOTES),
        receipt_date,
        receipt_lines: vec![ReceiptLine {
            receipt_line_type: config.line_defaults.line_type.clone(),
            receipt_line_no: 1,
            receipt_line_hs_code: config.line_defaults.hs_code.clone(),
            receipt_line_name: config.line_defaults.name.clone(),
            receipt_line_price: line_amount.clone(),
            receipt_line_quantity: 1,
            receipt_line_total: line_amount,
            tax_percent: config.line_defaults.tax_percent,
        }],
        receipt_payments: vec![ReceiptPayment {
            money_type_code: config.line_defaults.money_type_code,
            payment_amount: receipt_total.clone(),
        }],
        receipt_total,
    }
}
