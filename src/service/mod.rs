// ============================================================================
// Transfer Services
// ============================================================================
//
// Two boundary styles around the same debit/credit logic:
// - `TransferService`: drives acquire / manual mode / commit-or-rollback /
//   release itself
// - `TemplateTransferService`: hands the logic to a `TransactionTemplate`,
//   which owns the boundary and applies a `RollbackPolicy`
//
// ============================================================================

mod managed;
mod template;
mod transfer;

pub use managed::TemplateTransferService;
pub use template::{RollbackPolicy, TransactionTemplate};
pub use transfer::{TransferConfig, TransferRequest, TransferService};
