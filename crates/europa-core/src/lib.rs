pub mod autocuts;
pub mod consts;
pub mod cutout;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod rgbmap;
pub mod viewport;
