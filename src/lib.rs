//! # a3s-taint
//!
//! Runtime taint tracking by merits for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-taint` attaches a label set to host values and decides, for every
//! derived value, which labels survive. A value is either **clean**
//! (untracked) or **tainted** with an ordered list of **merits**: guarantees
//! such as "safe for SQL" granted by a cleaning function. Each merit carries a
//! propagation policy that controls whether the guarantee outlives an
//! operation mixing it with other data.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_taint::{Merit, Propagation, TaintedStr};
//!
//! # fn example() -> a3s_taint::Result<()> {
//! let html = Merit::new("html", Propagation::Partial);
//!
//! // Untrusted input, then escaped
//! let input = TaintedStr::new("<b>").tainted()?;
//! let escaped = input.clean_for(&html)?;
//! assert!(escaped.is_clean_for(&html));
//!
//! // Mixing with other tracked data drops nothing shared...
//! let both = escaped.concat(&escaped)?;
//! assert!(both.is_clean_for(&html));
//!
//! // ...but a partial merit does not survive concatenation with a clean value
//! let mixed = escaped.concat(&TaintedStr::new("!"))?;
//! assert!(mixed.is_tainted());
//! assert!(!mixed.is_clean_for(&html));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Propagation
//!
//! - **Full**: survives any combination
//! - **Partial**: survives only when every tracked operand carries it
//! - **None**: dropped by any derivation mixing operands (the default)
//!
//! ## Architecture
//!
//! - **Merit** / **Taint**: label instances and label sets
//! - **propagation**: `combine`, `propagate_to`, `collect`
//! - **adapter**: stamps label sets onto shared values with copy-on-write
//! - **Taintable** trait: what the engine needs from a host value
//! - **Policy**: sources, cleaners, sinks, and propagators loaded from a
//!   `TaintConfig`

pub mod adapter;
pub mod config;
pub mod error;
pub mod guard;
pub mod host;
pub mod merit;
pub mod policy;
pub mod propagation;
pub mod registry;
pub mod taint;
pub mod text;
pub mod value;

// Re-export core types
pub use adapter::{
    assign, assign_shared, get_labelset, is_taintable, taint_fixed_sequence, taint_in_place,
    FixedSeq,
};
pub use config::{
    ArgumentSpec, ComplexSinkSpec, FunctionGroup, MeritConfig, SinkEntry, TaintConfig,
    ValidationReport,
};
pub use error::{Result, TaintError};
pub use guard::{source, ArgumentCheck, Cleaner, Sink};
pub use host::{Interner, TaintedStr, Taintable};
pub use merit::{is_valid_merit, validate_merit, Merit, Propagation, Strategy};
pub use policy::Policy;
pub use propagation::{collect, combine, propagate_to};
pub use registry::{builtin_merits, MemoryMeritRegistry, MeritRegistry};
pub use taint::{add_merit, empty_merits, is_clean, Merits, Taint};
pub use value::{collect_taint, taint_value, Value};
