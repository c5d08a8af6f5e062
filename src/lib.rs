//! Back half of a compiler for a Java-like language: flow analysis and JVM bytecode generation
//!
//! Input is a resolved syntax tree ([`ast`]) whose names point into a [`binding::BindingTable`].
//! [`flow`] checks definite assignment and reachability, caching its findings on the tree, then
//! [`codegen`] turns each method into bytecode through the emitter in [`jvm`].

pub mod ast;
pub mod binding;
pub mod codegen;
pub mod diagnostics;
pub mod flow;
pub mod jvm;
pub mod util;
