pub mod point;
pub mod record;

pub use point::{DatedValue, NumericValue, PricePoint, RatioPoint};
pub use record::MergedRecord;
