pub mod handlers;

pub use handlers::{
    batch_upload, cancel_job, delete_job, health_check, job_status, list_jobs, ApiState,
};
