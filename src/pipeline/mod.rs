//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the cloud-facing steps can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ extract ──▶ response ──▶ mapper ──▶ csv_out
//! (paths)   (store)   (job+poll)  (block tree) (records)  (append)
//! ```
//!
//! 1. [`input`]    — expand files, directories and globs; validate `%PDF`
//!    before any network call
//! 2. [`upload`]   — copy the PDF to `remote_upload_path + file name`
//! 3. [`extract`]  — submit the analysis job, poll with a bounded loop,
//!    fetch the merged result
//! 4. [`response`] — index the flat block list into a typed tree
//! 5. [`mapper`]   — find the invoice date and line-item tables, build
//!    records ([`normalize`] cleans the cell text)
//! 6. [`csv_out`]  — append records; the header goes only into an empty file

pub mod csv_out;
pub mod extract;
pub mod input;
pub mod mapper;
pub mod normalize;
pub mod response;
pub mod upload;
