mod jobs;
mod logs;
mod providers;

pub use jobs::*;
pub use logs::*;
pub use providers::*;
