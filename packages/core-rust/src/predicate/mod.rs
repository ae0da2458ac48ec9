//! Structured condition trees and their compilation to SQL predicates.

mod compiler;
mod condition;

pub use compiler::{compile, CompileError, Compiled, Compiler, Filter, RANDOM_ORDER, TAUTOLOGY};
pub use condition::{Condition, ConditionMap, InList, Operand, Operator, SortOrder};
