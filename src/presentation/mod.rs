pub mod render;
pub mod tree;
pub mod views;
