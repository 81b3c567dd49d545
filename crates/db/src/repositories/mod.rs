pub mod record_repo;
pub mod run_repo;

pub use record_repo::RecordRepo;
pub use run_repo::RunRepo;
