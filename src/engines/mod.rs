pub mod translate;
pub mod warp;
