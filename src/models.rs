pub mod activity;
pub mod auth;
pub mod documents;
pub mod leads;
pub mod materials;
pub mod reports;
pub mod steps;
