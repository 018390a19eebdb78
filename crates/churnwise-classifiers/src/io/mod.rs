pub mod artifacts;

pub use artifacts::{read_json_artifact, write_json_artifact, ArtifactPaths};
