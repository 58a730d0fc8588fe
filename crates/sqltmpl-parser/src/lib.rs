mod blueprint;
mod build;
mod condition;
mod marker;

pub use blueprint::{Blueprint, Clause, ClauseKind, DynamicProjection, Segment};
pub use build::compile;
pub use condition::{CondAtom, CondExpr, Join, LinearExpr};
