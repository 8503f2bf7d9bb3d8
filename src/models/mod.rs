pub mod invite_code;
pub mod organization;
pub mod protest;

pub use invite_code::{InviteCode, InviteCodeRecord, IssuedInviteCode, RedeemerSummary};
pub use organization::{Org, OrgFilter, OrgView, VerificationStatus};
pub use protest::{OrganizerSummary, Protest, ProtestRecord};
