pub mod checkpoint;
pub mod errors;
pub mod eval;
pub mod logger;
pub mod spaces;
pub mod to_tensor;
pub mod utils;
