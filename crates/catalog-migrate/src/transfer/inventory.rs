//! Per-copy inventory rows.

use crate::error::Result;
use crate::target::TargetSession;

/// Insert copies `1..=quantity` for `catalog_id`.
///
/// A missing or non-positive quantity inserts nothing. Returns the number of
/// rows inserted.
pub async fn expand_inventory<T>(target: &mut T, catalog_id: i64, quantity: Option<i64>) -> Result<u64>
where
    T: TargetSession + ?Sized,
{
    let quantity = match quantity {
        Some(q) if q > 0 => q,
        _ => return Ok(0),
    };

    for copy_seq in 1..=quantity {
        target.insert_inventory(catalog_id, copy_seq).await?;
    }

    Ok(quantity as u64)
}
