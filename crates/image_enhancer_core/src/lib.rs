pub mod domain;
pub mod ports;

pub use domain::{
    Account, ExportFormat, NewAccount, Technique, TechniqueCount, TimelinePoint, UsageRecord, View,
};
pub use ports::{AccountStore, ImageCodec, ImageEnhancer, PortError, PortResult};
