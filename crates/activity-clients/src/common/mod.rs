pub mod errors;
pub mod tx_submitter;
