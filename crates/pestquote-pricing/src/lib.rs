pub mod discount;
pub mod line_item;
pub mod size;
pub mod totals;

pub use discount::{AppliedDiscount, DiscountSource, ManualDiscount, resolve_discount};
pub use line_item::{
    LinePrice, LineRequest, apply_discount, price_add_on, price_line, price_plan, reprice_plan_line,
};
pub use size::{SizeAdjustment, SizeOption, home_size_options, size_adjustment, yard_size_options};
pub use totals::{QuoteTotals, draft_from_lead};
