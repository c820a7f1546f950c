pub mod init;
pub mod simulate;
pub mod status;
pub mod transcript;
