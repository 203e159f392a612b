//! Data models shared across VNAP services

mod address;
mod admin_unit;
mod cache_entry;

pub use address::{
    AddressComponents, AddressResult, AlleyInfo, Candidate, HouseInfo, MatchStrategy, ParseStatus,
    QualityFlag, QualityInfo, RoadCodeInfo, StreetInfo,
};
pub use admin_unit::{AdminLevel, AdminSubtype, AdminUnit};
pub use cache_entry::CacheEntry;
