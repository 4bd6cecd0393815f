//! Bundled apps
//!
//! | App | Value | Combine | Rounds |
//! |-----|-------|---------|--------|
//! | [`Sssp`] | `f64` distance | Min | until no distance improves |
//! | [`Wcc`] | `i64` component id | Min | until no id shrinks |
//! | [`InDegree`] | `u64` count | Sum | PEval plus one |
//! | [`PageRank`] | `f64` contribution | Sum | `max_round` plus one |

pub mod in_degree;
pub mod page_rank;
pub mod sssp;
pub mod wcc;

pub use in_degree::{InDegree, InDegreeContext};
pub use page_rank::{PageRank, PageRankArgs, PageRankContext};
pub use sssp::{Sssp, SsspArgs, SsspContext};
pub use wcc::{Wcc, WccContext};
