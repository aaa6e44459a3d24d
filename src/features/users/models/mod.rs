mod profile;

pub use profile::{UserProfile, UserStatus};
