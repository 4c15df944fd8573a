pub mod activity_service;
pub mod auth;
pub mod document_service;
pub mod lead_service;
pub mod material_service;
pub mod notification_service;
pub mod report_service;
pub mod storage;
pub mod workflow_service;
