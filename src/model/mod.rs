//! The model module contains all the structs, enums and types used by the library
//! to represent the data received from the Discord API.

pub mod gateway;
pub mod guild;
pub mod message;
pub mod presence;
pub mod user;
pub mod voice;
