use anyhow::Context;

/// Put `text` on the system clipboard.
pub fn copy_text(text: &str) -> anyhow::Result<()> {
    let mut cb = arboard::Clipboard::new().context("opening clipboard")?;
    cb.set_text(text.to_owned()).context("writing clipboard")?;
    Ok(())
}

/// Copy the latest successful response. Returns `false` when there is
/// nothing to copy.
pub fn copy_last_response(last: Option<&str>) -> anyhow::Result<bool> {
    match last {
        Some(text) => {
            copy_text(text)?;
            tracing::info!("last response copied to clipboard");
            Ok(true)
        }
        None => {
            tracing::info!("no response to copy");
            Ok(false)
        }
    }
}
