//! Wire types for the fiscalisation API.
//!
//! Field names are renamed to the exact JSON the external authority
//! expects; the casing is inconsistent on the wire (`buyerTIN`,
//! `receiptLineHSCode`, `dreceiptNumber`) and must be preserved
//! bit-for-bit for interoperability.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A complete receipt submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDetails {
    #[serde(rename = "receiptType")]
    pub receipt_type: i32,
    #[serde(rename = "receiptCurrency")]
    pub receipt_currency: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "invoiceNo")]
    pub invoice_no: String,
    #[serde(rename = "buyerData")]
    pub buyer_data: BuyerData,
    #[serde(rename = "receiptNotes")]
    pub receipt_notes: String,
    #[serde(rename = "receiptDate")]
    pub receipt_date: String,
    #[serde(rename = "receiptLines")]
    pub receipt_lines: Vec<ReceiptLine>,
    #[serde(rename = "receiptPayments")]
    pub receipt_payments: Vec<ReceiptPayment>,
    /// Sum of the payment amounts, two fixed decimals.
    #[serde(rename = "receiptTotal")]
    pub receipt_total: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerData {
    #[serde(rename = "buyerRegisterName")]
    pub buyer_register_name: String,
    #[serde(rename = "buyerTradeName")]
    pub buyer_trade_name: String,
    #[serde(rename = "vatNumber")]
    pub vat_number: String,
    #[serde(rename = "buyerTIN")]
    pub buyer_tin: String,
    #[serde(rename = "buyerContacts")]
    pub buyer_contacts: BuyerContacts,
    #[serde(rename = "buyerAddress")]
    pub buyer_address: BuyerAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerContacts {
    #[serde(rename = "phoneNo")]
    pub phone_no: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerAddress {
    pub province: String,
    pub street: String,
    #[serde(rename = "houseNo")]
    pub house_no: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    #[serde(rename = "receiptLineType")]
    pub receipt_line_type: String,
    #[serde(rename = "receiptLineNo")]
    pub receipt_line_no: i32,
    #[serde(rename = "receiptLineHSCode")]
    pub receipt_line_hs_code: String,
    #[serde(rename = "receiptLineName")]
    pub receipt_line_name: String,
    /// Monetary amount as a fixed two-decimal string.
    #[serde(rename = "receiptLinePrice")]
    pub receipt_line_price: String,
    #[serde(rename = "receiptLineQuantity")]
    pub receipt_line_quantity: i32,
    #[serde(rename = "receiptLineTotal")]
    pub receipt_line_total: String,
    /// Serialized as a JSON number, matching the authority's schema.
    #[serde(rename = "taxPercent", with = "rust_decimal::serde::float")]
    pub tax_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptPayment {
    #[serde(rename = "moneyTypeCode")]
    pub money_type_code: i32,
    #[serde(rename = "paymentAmount")]
    pub payment_amount: String,
}

/// The fields consumed from a successful response. The authority mixes
/// Pascal and camel case here as well; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiscalResponse {
    #[serde(rename = "VerificationCode")]
    pub verification_code: Option<String>,
    #[serde(rename = "qrlUrl")]
    pub qr_url: Option<String>,
    #[serde(rename = "FiscalisationStatus")]
    pub fiscalisation_status: Option<String>,
    #[serde(rename = "dreceiptNumber")]
    pub d_receipt_number: Option<String>,
    #[serde(rename = "invoiceDate")]
    pub invoice_date: Option<String>,
    #[serde(rename = "deviceID")]
    pub device_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_receipt() -> ReceiptDetails {
        ReceiptDetails {
            receipt_type: 0,
            receipt_currency: "USD".into(),
            device_id: "17436".into(),
            invoice_no: "T-1001".into(),
            buyer_data: BuyerData {
                buyer_register_name: "Acme Ltd".into(),
                buyer_trade_name: "Acme Ltd".into(),
                vat_number: "000000000".into(),
                buyer_tin: "0000000000".into(),
                buyer_contacts: BuyerContacts {
                    phone_no: "+263 77 000 0000".into(),
                    email: "billing@acme.example".into(),
                },
                buyer_address: BuyerAddress {
                    province: "Harare".into(),
                    street: "1 Main St".into(),
                    house_no: "1 Main St".into(),
                    city: "Harare".into(),
                },
            },
            receipt_notes: "Deal note".into(),
            receipt_date: "2026-01-05".into(),
            receipt_lines: vec![ReceiptLine {
                receipt_line_type: "Sale".into(),
                receipt_line_no: 1,
                receipt_line_hs_code: "001".into(),
                receipt_line_name: "0.92% Brokerage Fees".into(),
                receipt_line_price: "12.30".into(),
                receipt_line_quantity: 1,
                receipt_line_total: "12.30".into(),
                tax_percent: Decimal::new(155, 1),
            }],
            receipt_payments: vec![ReceiptPayment {
                money_type_code: 5,
                payment_amount: "12.30".into(),
            }],
            receipt_total: "12.30".into(),
        }
    }

    #[test]
    fn receipt_serializes_exact_field_names() {
        let json = serde_json::to_string(&sample_receipt()).unwrap();
        for field in [
            r#""receiptType""#,
            r#""receiptCurrency""#,
            r#""deviceID""#,
            r#""invoiceNo""#,
            r#""buyerData""#,
            r#""buyerRegisterName""#,
            r#""buyerTIN""#,
            r#""buyerContacts""#,
            r#""phoneNo""#,
            r#""buyerAddress""#,
            r#""houseNo""#,
            r#""receiptNotes""#,
            r#""receiptDate""#,
            r#""receiptLines""#,
            r#""receiptLineHSCode""#,
            r#""receiptLinePrice""#,
            r#""taxPercent""#,
            r#""receiptPayments""#,
            r#""moneyTypeCode""#,
            r#""paymentAmount""#,
            r#""receiptTotal""#,
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
        assert!(!json.contains("receipt_type"));
    }

    #[test]
    fn tax_percent_serializes_as_number() {
        let json = serde_json::to_string(&sample_receipt()).unwrap();
        assert!(json.contains(r#""taxPercent":15.5"#), "{json}");
    }

    #[test]
    fn receipt_roundtrip() {
        let receipt = sample_receipt();
        let json = serde_json::to_string(&receipt).unwrap();
        let parsed: ReceiptDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.receipt_currency, "USD");
        assert_eq!(parsed.receipt_lines.len(), 1);
        assert_eq!(parsed.receipt_lines[0].receipt_line_total, "12.30");
        assert_eq!(parsed.receipt_payments[0].payment_amount, "12.30");
        assert_eq!(parsed.receipt_total, "12.30");
    }

    #[test]
    fn response_deserializes_from_api_format() {
        let json = r#"{
            "VerificationCode": "ABCD-1234",
            "qrlUrl": "https://verify.example/ABCD-1234",
            "FiscalisationStatus": "Fiscalised",
            "dreceiptNumber": "42",
            "invoiceDate": "2026-01-05",
            "deviceID": "17436",
            "somethingExtra": true
        }"#;
        let response: FiscalResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.verification_code.as_deref(), Some("ABCD-1234"));
        assert_eq!(response.d_receipt_number.as_deref(), Some("42"));
        assert_eq!(response.device_id.as_deref(), Some("17436"));
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let response: FiscalResponse = serde_json::from_str("{}").unwrap();
        assert!(response.verification_code.is_none());
        assert!(response.qr_url.is_none());
    }
}
