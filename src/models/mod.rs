pub mod event;
pub mod location;
pub mod presence;
pub mod request;
