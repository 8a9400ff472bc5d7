pub mod pricing;
pub mod ws;
