//! Constraint solver for mod selection.
//!
//! Candidate selection is encoded as boolean rules over one variable per
//! candidate and optimized against the priority order from
//! [`crate::sort`].
//!
//! # Architecture
//!
//! - [`Rule`] / [`RuleSet`]: clauses and at-most-one constraints
//! - `encoder`: turns candidates, dependencies and load conditions into rules
//! - `engine`: branch-and-bound search with two-watched-literal propagation
//! - [`ModSolver`]: runs the normal instance and, on failure, the
//!   explanation and fix instances
//!
//! # Failure analysis
//!
//! 1. **Explain**: every hard dependency edge gets a toggle that switches it
//!    off at a cost. The cheapest set of toggles is the immediate cause.
//! 2. **Fix**: stand-in versions are derived from the failed predicates and
//!    offered as synthetic additions, next to removal of root mods. The
//!    cheapest feasible change is reported as additions, replacements and
//!    removals.
//!
//! # Example
//!
//! ```ignore
//! use kiln_resolve::solver::{ModSolver, Resolution};
//!
//! let order = kiln_resolve::sort::sort_candidates(&store);
//! match ModSolver::new(&store, &order).solve(&[])? {
//!     Resolution::Success(selection) => println!("{} mods", selection.len()),
//!     Resolution::Failure(failure) => eprintln!("{}", failure),
//! }
//! ```

mod decisions;
mod encoder;
mod engine;
mod fix;
mod problem;
mod rule;
mod rule_set;
mod solver;
mod variables;
mod watch_graph;


pub use decisions::Decisions;
pub use fix::{synthesize_additions, AddedMod};
pub use problem::{Explanation, Fix, ModRef, Replacement, Resolution, ResolutionFailure, Selection};
pub use rule::{Literal, Rule, RuleType};
pub use rule_set::RuleSet;
pub use solver::ModSolver;
pub use variables::DomainVar;
