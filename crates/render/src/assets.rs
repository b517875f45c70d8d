//! Templates embedded into the binary at compile time using
//! [`rust-embed`](rust_embed).

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "../../assets/templates/"]
pub(crate) struct Templates;
impl Templates {
    /// Load a template's source by file name.
    pub(crate) fn load(name: &str) -> Result<String> {
        let file = Self::get(name).ok_or_raise(|| ErrorKind::AssetNotFound(name.to_string()))?;
        String::from_utf8(file.data.into_owned()).or_raise(|| ErrorKind::AssetEncoding(name.to_string()))
    }
}
