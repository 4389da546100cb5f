//! Background schedulers and attribution services
//!
//! The schedulers are independent task objects composed at startup; they
//! never coordinate in-process. All coordination happens through the
//! conditional updates in `crate::db::audits`, so overlapping ticks of the
//! same job or concurrent ticks of different jobs commute.

pub mod attribution;
pub mod eligibility;
pub mod follow_up;
pub mod liquidacion;
pub mod nightly;
pub mod team_history;

pub use eligibility::EligibilityScheduler;
pub use follow_up::FollowUpEscalator;
pub use liquidacion::LiquidacionSweep;
pub use nightly::NightlyStateSweep;
