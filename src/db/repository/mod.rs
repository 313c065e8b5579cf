// Repository modules: bare functions over a borrowed connection, one file
// per entity. Callers own the connection and compose these with the retry
// layer in db::retry.

mod document;
mod language;
mod output;

pub use document::*;
pub use language::*;
pub use output::*;
