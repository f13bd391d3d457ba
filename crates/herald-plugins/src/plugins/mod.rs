//! Built-in plugins.

pub mod help;
pub mod hold;

use herald_types::Result;

use crate::handler::Plugin;

/// Every built-in plugin, in registration order.
pub fn builtin_plugins() -> Result<Vec<Plugin>> {
    Ok(vec![hold::plugin()?, help::plugin()?])
}
