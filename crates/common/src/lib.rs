//! Shared vocabulary for the shadekit crates: filter modes, shader stages and
//! the color palette used by game code.

mod types;

pub use types::{FilterMode, ShaderStage, palette, rgba};
