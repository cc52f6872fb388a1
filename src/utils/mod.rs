//! Text and path utilities shared by the build stages.

pub mod category;
pub mod css;
pub mod exec;
pub mod inky;
pub mod tokens;
