mod album;
mod event;
mod media;

pub use album::*;
pub use event::*;
pub use media::*;
