pub mod diagnostics;

pub use diagnostics::warning_count;
