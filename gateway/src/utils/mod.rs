pub mod audio;
pub mod phone;
