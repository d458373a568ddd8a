//! Infrastructure layer - storage, notification and logging implementations

pub mod deployment_group;
pub mod logging;
