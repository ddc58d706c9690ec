pub mod client;
pub mod types;

pub use client::{FiscalApiClient, ReceiptSubmitter, SubmitOutcome};
pub use types::{
    BuyerAddress, BuyerContacts, BuyerData, FiscalResponse, ReceiptDetails, ReceiptLine,
    ReceiptPayment,
};
