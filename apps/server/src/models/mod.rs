pub mod listing;
pub mod promotion;

pub use listing::{CreateListing, Listing, ListingProjection};
pub use promotion::{
    ActivateBundle, BundleApplied, BundleItem, BundlePayment, BundleWrite, Candidate,
    ExpiredPromotion, PromotedListing, Promotion, PromotionType,
};
