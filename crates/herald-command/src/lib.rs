//! Line-anchored slash-command matching shared by all Herald plugins.
//!
//! A command occupies its own line, is matched case-insensitively, and may be
//! surrounded by horizontal whitespace. A bare command (`/hold`) only matches
//! when nothing follows it on the line, so its argument form (`/hold cancel`)
//! can never satisfy the bare pattern.
//!
//! # Example
//! ```
//! use herald_command::{CommandPair, Directive};
//!
//! let hold = CommandPair::with_cancel("hold", "cancel").unwrap();
//! assert_eq!(hold.resolve("/hold"), Directive::Set);
//! assert_eq!(hold.resolve("lgtm\n  /HOLD Cancel  \n"), Directive::Cancel);
//! assert_eq!(hold.resolve("please /hold"), Directive::None);
//! ```

mod matcher;

pub use matcher::{CommandMatcher, CommandPair, Directive};
