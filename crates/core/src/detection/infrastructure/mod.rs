pub mod stub_backend;
pub mod subprocess_backend;
pub mod worker_channel;
