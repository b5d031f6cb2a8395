pub mod account;
pub mod appointment;
pub mod care;
pub mod conversation;
pub mod enums;
pub mod insight;
pub mod prescription;
pub mod reminder;

pub use account::*;
pub use appointment::*;
pub use care::*;
pub use conversation::*;
pub use insight::*;
pub use prescription::*;
pub use reminder::*;
