pub mod auth;
pub mod documents;
pub mod leads;
pub mod materials;
pub mod notifications;
pub mod reports;
pub mod steps;
