pub mod cucumber;
pub mod defaults;
