pub mod admin;
pub mod capture;
