pub mod capability;
pub mod diff;
pub mod disk;
pub mod resolver;

pub use capability::CapabilityProfile;
pub use diff::{backend_files, missing, IncludeFilter};
pub use resolver::{ModelResolver, ResolvedModel};
