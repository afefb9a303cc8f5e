pub mod amounts;
pub mod response;
