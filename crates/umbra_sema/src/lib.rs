//! Semantic analysis for umbra modules.
//!
//! Three passes over the parsed tree, in order: the situator validates and
//! disambiguates opcodes against the situation table, the tabulator collects
//! declarations into scopes and entity arenas, and the resolver freezes every
//! entity's symbol and signature. Tabulation of all modules completes before
//! any resolution starts so forward and cross-module references work.

pub mod attributes;
pub mod entity;
pub mod layout;
pub mod resolver;
pub mod scope;
pub mod situation;
pub mod situator;
pub mod symbol;
pub mod tabulator;

pub use attributes::{AttributeFlags, AttributeKind};
pub use entity::EntityArenas;
pub use layout::TargetLayout;
pub use resolver::resolve;
pub use scope::{ModuleScope, ModuleScopes, NoModules, ScopeArena, ScopeEntry, ScopeId};
pub use situation::{Situation, SituationTable};
pub use situator::situate;
pub use symbol::{RootSymbol, Signature, SubSymbol, SubSymbolKind, Symbol};
pub use tabulator::tabulate;
