// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::model;

// === MODULE DEFINITION ===
pub mod module;
pub use module::{register, People, MODULE_NAME};

// === INTERNAL MODULES ===
// Exposed for tests; other modules should only use `contract`.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
