pub mod albums;
pub mod archive;
pub mod download_status;
pub mod events;
pub mod image;
pub mod media;
pub mod storage;
pub mod upload;
pub mod validation;
pub mod video;
