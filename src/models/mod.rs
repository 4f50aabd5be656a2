//! Domain records and their create/patch inputs.
//!
//! Every `*Patch` carries `Option` fields only: `None` keeps the stored
//! value, `Some` overwrites it. Nothing is ever nulled by omission.

/// Copy the `Some` fields of a patch onto a record.
///
/// `set` fields replace a plain value, `wrap` fields fill an `Option` slot.
macro_rules! apply_patch {
    ($patch:ident => $target:ident; set: [$($f:ident),* $(,)?]; wrap: [$($g:ident),* $(,)?]) => {{
        $( if let Some(v) = $patch.$f { $target.$f = v; } )*
        $( if let Some(v) = $patch.$g { $target.$g = Some(v); } )*
    }};
}

pub mod care;
pub mod comms;
pub mod enums;
pub mod record;
pub mod resident;
pub mod shift;
pub mod user;

pub use care::*;
pub use comms::*;
pub use record::*;
pub use resident::*;
pub use shift::*;
pub use user::*;
