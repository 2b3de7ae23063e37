pub mod anonymize;
pub mod error;
pub mod events;
pub mod interval;
