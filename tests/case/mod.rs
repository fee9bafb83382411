//! Case Workflow Property Tests
//!
//! Invariants of the two-person review and of the approval workflow that must
//! hold for any caseworker identities and any answer arrival order.

pub mod answer_order_test;
pub mod review_guard_test;
