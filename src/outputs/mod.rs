//! Run report output.
//!
//! # Submodules
//!
//! - [`json`]: writes a [`RunReport`](crate::models::RunReport) as a JSON file
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── 20250506_081500.json
//! └── 20250506_201230.json
//! ```

pub mod json;
