//! Handlers compiled into the server, published through the static catalog.

use std::sync::Arc;

use plexus_core::{HandlerCatalog, LanguageHandler};

mod whitespace;
mod words;

pub(crate) fn catalog() -> HandlerCatalog {
    let mut catalog = HandlerCatalog::new();
    catalog
        .add(words::ID, |source| {
            words::WordCompleter::from_source(source).map(|h| Arc::new(h) as Arc<dyn LanguageHandler>)
        })
        .add(whitespace::ID, |_| {
            Ok(Arc::new(whitespace::TrailingWhitespace) as Arc<dyn LanguageHandler>)
        });
    catalog
}
