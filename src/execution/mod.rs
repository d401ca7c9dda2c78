// Order execution: sizing and the two-phase bracket protocol
pub mod bracket;
pub mod sizing;

pub use bracket::execute_bracket;
pub use sizing::{resolve_quantity, SizedOrder};
