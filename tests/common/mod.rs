pub mod builders;

pub use builders::*;
pub use observers::*;
pub use steps::*;
