//! Delta selection: which fetched items have not been delivered yet.

use tracing::trace;

use crate::ledger::Ledger;
use crate::source::CandidateItem;

/// Keep, in input order, every item whose identifier is not in `ledger`.
///
/// Items are only compared against the ledger, not against each other: two
/// sources emitting the same identifier both pass through, and the ledger
/// merge after delivery records that identifier once.
pub fn select(items: Vec<CandidateItem>, ledger: &Ledger) -> Vec<CandidateItem> {
    items
        .into_iter()
        .filter(|item| {
            let delivered = ledger.contains(&item.id);
            if delivered {
                trace!(id = %item.id, source = %item.source, "already delivered");
            }
            !delivered
        })
        .collect()
}
