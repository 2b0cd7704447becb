#![warn(missing_docs)]

//! STEP (ISO 10303-21) import into a boundary representation.
//!
//! A file is parsed into raw instances, each instance is resolved once
//! through the [`Registry`] into a typed [`Entity`], and every top-level
//! shape is emitted into a [`stepbrep_topo::Brep`]. Targets the AP203,
//! AP214 and AP242 geometry and topology resources.
//!
//! # Example
//!
//! ```no_run
//! use stepbrep_step::{read_step, ReaderOptions};
//!
//! let conversion = read_step("model.step", &ReaderOptions::default()).unwrap();
//! for shape in &conversion.shapes {
//!     match &shape.result {
//!         Ok(brep) => println!("#{}: {} faces", shape.root, brep.faces.len()),
//!         Err(err) => println!("#{}: {err}", shape.root),
//!     }
//! }
//! ```

pub mod assembly;
pub mod emit;
pub mod entities;
mod error;
mod lexer;
mod options;
mod parser;
mod pullback;
pub mod query;
mod reader;
pub mod registry;
mod schema;

pub use emit::{Emitter, FaceFailure};
pub use entities::Entity;
pub use error::{ErrorKind, Result, StepError};
pub use options::{ReaderOptions, FALLBACK_SHAPE_TYPES, PRIMARY_SHAPE_TYPES};
pub use parser::{Parser, StepFile};
pub use reader::{read_step, read_step_from_buffer, Conversion, ShapeOutcome};
pub use registry::{EntityId, Registry, RegistryStats};
