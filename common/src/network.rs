pub mod address;
pub mod mac;
