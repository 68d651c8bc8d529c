//! Repository traits for metadata operations.

pub mod images;
pub mod users;

pub use images::ImageRepo;
pub use users::UserRepo;
