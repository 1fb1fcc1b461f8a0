pub mod build;
pub mod doctor;
pub mod listen;
pub mod onboard;
pub mod smoke;
pub mod status;
