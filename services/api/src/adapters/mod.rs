pub mod codec;
pub mod filters;
pub mod json_store;

pub use codec::ImageRsCodec;
pub use filters::ImageprocEnhancer;
pub use json_store::JsonAccountStore;
