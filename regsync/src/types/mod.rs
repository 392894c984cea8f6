mod image;
mod inventory;

pub use image::*;
pub use inventory::*;
