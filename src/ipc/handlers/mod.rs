pub mod alerts;
pub mod attendance;
pub mod audit;
pub mod catalog;
pub mod core;
pub mod discrepancies;
pub mod justify;
pub mod sync;
