pub mod archive;
pub mod media;
