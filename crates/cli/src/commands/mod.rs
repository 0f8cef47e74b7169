pub mod doctor;
pub mod init;
pub mod log;
pub mod run;
pub mod schedule;
