pub mod mask;

pub use mask::{mask, mask_secret};
