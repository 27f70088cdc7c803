//! The expression arena and opcode set shared by every stage of the umbra
//! front end.
//!
//! Every parsed construct is an [Expr] living in an [ExprArena]; `branch`
//! points at the first child and `next` at the right sibling, so a node's
//! children form a singly-linked list. Both links are set-once: assigning an
//! already-set link is a defect in an earlier stage and panics.

pub mod arena;
pub mod data;
pub mod dump;
pub mod opcode;
pub mod set_once;

pub use arena::{Expr, ExprArena, ExprId};
pub use data::{EntityRef, ExprData};
pub use dump::dump;
pub use opcode::Opcode;
pub use set_once::SetOnce;
