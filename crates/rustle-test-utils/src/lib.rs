//! Utilities shared by Rustle tests.
//!
//! Fixtures are written inline as several files separated by `//- /path` lines, with optional
//! `$0`, `$1`, ... markers, or kept on disk as before/after directory pairs.
//!
//! ```text
//! //- /src/lib.rs
//! mod a;
//! //- /src/a.rs
//! pub struct $0S;
//! ```

mod fixtures;

pub use fixtures::*;
