pub mod activation;
pub mod fair_share;
pub mod maintenance;
pub mod payment;
pub mod pricing;
pub mod projection;
pub mod rotation;

pub use activation::{Activation, ActivationService};
pub use fair_share::{FairShareReport, FairShareService, ShownStatus};
pub use maintenance::{ExpirySummary, MaintenanceService, ResetSummary};
pub use payment::{PaymentConfirmation, PaymentService};
pub use pricing::{BundleQuote, QuoteItem};
pub use projection::ProjectionService;
pub use rotation::{Rotation, RotationRequest, RotationService};
