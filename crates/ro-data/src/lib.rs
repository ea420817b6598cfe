pub mod discover;
pub mod expr;
pub mod store;
pub mod table;

pub use discover::*;
pub use expr::Expression;
pub use store::*;
pub use table::*;
