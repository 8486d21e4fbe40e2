use crate::error::{CapacityError, Result};

/// Converts a byte offset or length to the 32-bit width the file formats store
pub(crate) fn offset_u32(offset: u64) -> Result<u32> {
    u32::try_from(offset).map_err(|_| {
        CapacityError::SizeExceedsMaximum {
            size: offset,
            max: u64::from(u32::MAX),
        }
        .into()
    })
}
