//! Infrastructure layer - concrete collaborator implementations

pub mod storage;
