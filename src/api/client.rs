//! HTTP submission to the fiscalisation API.

use std::time::Duration;

use reqwest::Client;

use super::types::{FiscalResponse, ReceiptDetails};
use crate::error::ServiceError;

/// The result of a single submission attempt. Exactly one variant per
/// attempt; only [`Timeout`](SubmitOutcome::Timeout) is retryable.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// 2xx with a parsable body.
    Success { response: FiscalResponse, raw: String },
    /// The per-call deadline elapsed before a response arrived.
    Timeout(String),
    /// Non-2xx status, unparsable body, or a transport-level fault.
    Failure { message: String, raw: Option<String> },
}

/// Submission seam the worker drives; mocked in worker tests.
pub trait ReceiptSubmitter {
    async fn submit(
        &self,
        url: &str,
        receipt: &ReceiptDetails,
        timeout_seconds: u64,
    ) -> SubmitOutcome;
}

pub struct FiscalApiClient {
    client: Client,
}

impl FiscalApiClient {
    pub fn new() -> Result<Self, ServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

impl ReceiptSubmitter for FiscalApiClient {
    async fn submit(
        &self,
        url: &str,
        receipt: &ReceiptDetails,
        timeout_seconds: u64,
    ) -> SubmitOutcome {
        let seconds = timeout_seconds.max(1);
        let result = self
            .client
            .post(url)
            .json(receipt)
            .timeout(Duration::from_secs(seconds))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return SubmitOutcome::Timeout(format!("Timeout after {seconds}s"));
            }
            Err(e) => {
                return SubmitOutcome::Failure {
                    message: e.to_string(),
                    raw: None,
                };
            }
        };

        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => {
                return SubmitOutcome::Timeout(format!("Timeout after {seconds}s"));
            }
            Err(e) => {
                return SubmitOutcome::Failure {
                    message: e.to_string(),
                    raw: None,
                };
            }
        };

        if !status.is_success() {
            let message = format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return SubmitOutcome::Failure {
                message: message.trim_end().to_string(),
                raw: Some(raw),
            };
        }

        if raw.trim().is_empty() {
            return SubmitOutcome::Failure {
                message: "Failed to parse API response.".to_string(),
                raw: Some(raw),
            };
        }

        match serde_json::from_str::<FiscalResponse>(&raw) {
            Ok(parsed) => SubmitOutcome::Success {
                response: parsed,
                raw,
            },
            Err(_) => SubmitOutcome::Failure {
                message: "Failed to parse API response.".to_string(),
                raw: Some(raw),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn minimal_receipt() -> ReceiptDetails {
        use super::super::types::*;
        ReceiptDetails {
            receipt_type: 0,
            receipt_currency: "ZWG".into(),
            device_id: "17436".into(),
            invoice_no: "0".into(),
            buyer_data: BuyerData {
                buyer_register_name: "Customer name".into(),
                buyer_trade_name: "Customer name".into(),
                vat_number: "000000000".into(),
                buyer_tin: "0000000000".into(),
                buyer_contacts: BuyerContacts {
                    phone_no: "client phone number".into(),
                    email: "email address".into(),
                },
                buyer_address: BuyerAddress {
                    province: "Harare".into(),
                    street: "client address".into(),
                    house_no: "client address".into(),
                    city: "Harare".into(),
                },
            },
            receipt_notes: "details".into(),
            receipt_date: String::new(),
            receipt_lines: vec![ReceiptLine {
                receipt_line_type: "Sale".into(),
                receipt_line_no: 1,
                receipt_line_hs_code: "001".into(),
                receipt_line_name: "Fees".into(),
                receipt_line_price: "1.00".into(),
                receipt_line_quantity: 1,
                receipt_line_total: "1.00".into(),
                tax_percent: Decimal::new(155, 1),
            }],
            receipt_payments: vec![ReceiptPayment {
                money_type_code: 5,
                payment_amount: "1.00".into(),
            }],
            receipt_total: "1.00".into(),
        }
    }

    #[tokio::test]
    async fn parsable_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/receipts"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"VerificationCode":"VC1","FiscalisationStatus":"Fiscalised"}"#,
            ))
            .mount(&server)
            .await;

        let client = FiscalApiClient::new().unwrap();
        let url = format!("{}/receipts", server.uri());
        match client.submit(&url, &minimal_receipt(), 5).await {
            SubmitOutcome::Success { response, raw } => {
                assert_eq!(response.verification_code.as_deref(), Some("VC1"));
                assert!(raw.contains("Fiscalised"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_2xx_is_failure_with_status_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = FiscalApiClient::new().unwrap();
        match client.submit(&server.uri(), &minimal_receipt(), 5).await {
            SubmitOutcome::Failure { message, raw } => {
                assert_eq!(message, "HTTP 500 Internal Server Error");
                assert_eq!(raw.as_deref(), Some("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let client = FiscalApiClient::new().unwrap();
        match client.submit(&server.uri(), &minimal_receipt(), 5).await {
            SubmitOutcome::Failure { message, .. } => {
                assert_eq!(message, "Failed to parse API response.");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = FiscalApiClient::new().unwrap();
        match client.submit(&server.uri(), &minimal_receipt(), 5).await {
            SubmitOutcome::Failure { message, raw } => {
                assert_eq!(message, "Failed to parse API response.");
                assert_eq!(raw.as_deref(), Some("<html>not json</html>"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = FiscalApiClient::new().unwrap();
        match client.submit(&server.uri(), &minimal_receipt(), 1).await {
            SubmitOutcome::Timeout(message) => assert_eq!(message, "Timeout after 1s"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_failure_not_timeout() {
        let client = FiscalApiClient::new().unwrap();
        match client
            .submit("http://127.0.0.1:1/receipts", &minimal_receipt(), 5)
            .await
        {
            SubmitOutcome::Failure { raw, .. } => assert!(raw.is_none()),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
