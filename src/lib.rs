pub mod compute;
pub mod utils;

pub use compute::*;
pub use utils::{Handle, Pool};
