pub mod operators;
pub mod physical_expr;
pub mod predicate;

pub use operators::evaluate_expr;
pub use physical_expr::{create_physical_expr, PhysicalExpr};
pub use predicate::{evaluate_constant, Predicate};
