//! The WebAssembly to JavaScript link-editor library.
//!
//! `js-ld` combines a wasm object module with hand-written JavaScript files
//! declaring imported symbols and exports, and emits a single self-contained
//! JavaScript module. The output loads the wasm binary at runtime, wires up
//! circular JS/wasm symbol bindings through reflective proxies, and exposes
//! a UMD surface usable under AMD loaders, CommonJS and plain browser
//! globals.
//!
//! The pieces, leaf first: [`symbol_table`] and [`requirements`] register
//! the names crossing the module boundary, [`wasm`] is the structural view
//! of the input binary, [`files`] handles the user JS inputs, and
//! [`generator`] assembles the output script and verifies that it references
//! no free identifier outside the externs allowlist. [`linker`] drives the
//! whole thing over the filesystem.

pub mod cli;
pub mod files;
pub mod generator;
pub mod linker;
pub mod requirements;
pub mod symbol_table;
pub mod wasm;

pub use generator::{ModuleGenerator, DEFAULT_EXTERNS, EXPORTS_VAR, ROOT_VAR};
pub use linker::{LinkConfig, Linker};
