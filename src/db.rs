pub mod user_repo;
pub use user_repo::UserRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod step_repo;
pub use step_repo::StepRepository;
pub mod document_repo;
pub use document_repo::DocumentRepository;
pub mod material_repo;
pub use material_repo::MaterialRepository;
pub mod activity_repo;
pub use activity_repo::ActivityRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod report_repo;
pub use report_repo::ReportRepository;
