//! # pal-rs: whole-program points-to analysis
//!
//! **`pal-rs`** computes, for every pointer-valued location of a program, the set of
//! abstract storage locations it may point to. It is an inclusion-based (Andersen-style)
//! analysis over a flat memory model, built for package-at-a-time analysis of Go-like
//! programs: each package is solved on its own and exported as a compact, self-contained
//! result that downstream packages import.
//!
//! ## Key Features
//!
//! - **Flat Memory Model**: Every variable, field, array element and heap allocation is a
//!   [`Loc`][crate::loc::Loc] in one arena. Aggregates occupy contiguous runs, so a field is
//!   just an offset from its parent.
//! - **Four Constraint Kinds**: points-to (`a = &b`), load (`d = *s`), store (`*d = s`) and
//!   transfer (`d = s[i]`). See the [`model`] module for the exact semantics.
//! - **Worklist Solver**: [`Model::solve`][crate::model::Model::solve] runs to the least
//!   fixed point; the result is monotone in the constraints.
//! - **Hash-Consed Types**: [`TypeSet`][crate::types::TypeSet] interns structural types, so
//!   type equality is handle equality.
//! - **Pluggable Index Algebra**: array and slice indices are abstract values from an
//!   [`Indexing`][crate::indexing::Indexing] implementation.
//! - **Modular Results**: [`PkgRes`][crate::results::PkgRes] exports and imports package
//!   results, and encodes them in a line-oriented plain text format.
//!
//! ## Basic Usage
//!
//! ```rust
//! use pal_rs::loc::Attrs;
//! use pal_rs::model::Model;
//! use pal_rs::types::Type;
//!
//! let mut m = Model::default();
//! let int_ptr = m.types_mut().pointer_to(Type::INT);
//!
//! // var a, b int; var x, y *int
//! let a = m.local(Type::INT, Attrs::NONE);
//! let b = m.local(Type::INT, Attrs::NONE);
//! let x = m.local(int_ptr, Attrs::NONE);
//! let y = m.local(int_ptr, Attrs::NONE);
//!
//! // x = &a; y = &b; y = x
//! m.gen_points_to(x, a);
//! m.gen_points_to(y, b);
//! m.gen_transfer(y, x);
//!
//! m.solve();
//! assert_eq!(m.points_to(y).collect::<Vec<_>>(), vec![a, b]);
//! assert!(m.may_alias(x, y));
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: locations, constraints, export and import.
//! - **[`solve`]**: the fixed-point solver.
//! - **[`objects`]** and **[`builder`]**: typed views for translators.
//! - **[`results`]** and **[`registry`]**: per-package results and their store.
//! - **[`plain`]**: the textual encoding shared by all persisted structures.

pub mod bitset;
pub mod builder;
pub mod debug;
pub mod error;
pub mod indexing;
pub mod loc;
pub mod model;
pub mod objects;
pub mod plain;
pub mod registry;
pub mod results;
pub mod solve;
pub mod srcinfo;
pub mod table;
pub mod truth;
pub mod types;
pub mod utils;
