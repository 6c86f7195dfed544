pub mod client;
pub mod constants;
pub mod costco;
pub mod london_drugs;
pub mod safeway;
