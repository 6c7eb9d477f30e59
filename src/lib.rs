//! Reverse-mode automatic differentiation on an arena-backed tape.
//!
//! Arithmetic on [`Var`] records an expression graph on a per-thread tape;
//! [`Var::grad`] (or one of the drivers in [`api`]) sweeps it backwards to
//! fill in adjoints. [`nested`] regions let inner computations record and
//! discard their own nodes without disturbing the outer graph.

pub mod api;
pub mod arena;
pub mod nested;
pub mod scalar;
pub mod tape;
pub mod var;
mod traits;

pub use api::{grad, grad_hessian, hessian, jacobian, try_value_and_grad, value_and_grad, vjp};
pub use nested::{
    is_nested, nested, nesting_depth, recover_memory_nested, start_nested, NestedRegion,
};
pub use scalar::Scalar;
pub use tape::{free_memory, recover_memory, set_zero_all_adjoints, stats, TapeStats};
pub use var::Var;
