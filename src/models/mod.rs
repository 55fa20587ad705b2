// ============ Model implementations ============

pub(crate) mod bert;
pub(crate) mod modernbert;

// Public model structs and size enums (for type annotations)
pub use bert::{BertMaskedLm, BertSize};
pub use modernbert::{ModernBertMaskedLm, ModernBertSize};
