pub mod extractors;
pub mod token;

pub use extractors::MaintenanceAuth;
pub use token::{constant_time_eq, parse_bearer};
