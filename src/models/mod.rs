pub mod contact;
pub mod profile;
pub mod user;

pub use contact::*;
pub use profile::*;
pub use user::*;
