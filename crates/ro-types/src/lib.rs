pub mod counts;
pub mod cut;
pub mod errors;
pub mod sample;
pub mod significance;
pub mod source;
pub mod supercut;
pub mod template;

pub use counts::*;
pub use cut::*;
pub use errors::*;
pub use sample::*;
pub use significance::*;
pub use source::*;
pub use supercut::*;
pub use template::*;
