use crate::api::design_dto::DesignDto;
use crate::domain::design::NetworkDesign;
use crate::error::Result;
use crate::loader::parser::{parse_json_file, write_json_file};

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a design snapshot from a JSON file, re-validating every invariant
/// and running the consistency checker.
pub fn load_design(file_path: &str) -> Result<NetworkDesign> {
    let dto: DesignDto = parse_json_file::<DesignDto>(file_path)?;
    log::info!("Snapshot '{}' parsed successfully.", file_path);

    let design = NetworkDesign::from_dto(&dto)?;
    log::info!("Design '{}' constructed and consistency-checked.", design.name());

    Ok(design)
}

/// Writes a design snapshot to a JSON file.
pub fn save_design(file_path: &str, design: &NetworkDesign) -> Result<()> {
    write_json_file(file_path, &design.to_dto())?;
    log::info!("Design '{}' written to '{}'.", design.name(), file_path);
    Ok(())
}
