pub mod account;
pub mod email;
pub mod otp;
pub mod pricing;
