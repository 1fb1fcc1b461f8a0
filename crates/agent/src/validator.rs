//! Spatial validation of drafted plans.

use blockwright_core::error::ValidationError;
use blockwright_core::geometry::Size;
use blockwright_core::palette::Palette;
use blockwright_core::plan::Plan;

/// Check a plan against the operation limit, the relative size and the
/// palette. Checks run in that order and per operation in plan order;
/// the first violation is returned.
pub fn validate(
    plan: &Plan,
    size: &Size,
    palette: &Palette,
    max_operations: usize,
) -> Result<(), ValidationError> {
    if plan.len() > max_operations {
        return Err(ValidationError::TooManyOperations {
            actual: plan.len(),
            allowed: max_operations,
        });
    }

    for (index, op) in plan.iter().enumerate() {
        if !size.contains(op.position()) {
            return Err(ValidationError::OutOfBounds {
                index,
                x: op.x,
                y: op.y,
                z: op.z,
            });
        }
        if !palette.contains(&op.material) {
            return Err(ValidationError::DisallowedMaterial {
                index,
                material: op.material.clone(),
            });
        }
    }

    Ok(())
}
