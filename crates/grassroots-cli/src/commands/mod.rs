pub mod clock;
pub mod common;
pub mod completions;
pub mod fixture;
pub mod goal;
pub mod list;
pub mod prune;
pub mod record;
pub mod status;
pub mod sync;
